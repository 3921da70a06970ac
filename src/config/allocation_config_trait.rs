// ==========================================
// 集货分配系统 - 分配重算配置读取 Trait
// ==========================================
// 职责: 定义重算服务所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::cost_model::CostModel;
use async_trait::async_trait;
use std::error::Error;
use std::time::Duration;

// ==========================================
// AllocationConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait AllocationConfigReader: Send + Sync {
    /// 获取成本模型
    ///
    /// # 默认值
    /// - PER_ROUTE (150 + 1.80/mi，最低 200，每车 1000 件)
    async fn get_cost_model(&self) -> Result<CostModel, Box<dyn Error + Send + Sync>>;

    /// 获取登记数据读取超时
    ///
    /// # 默认值
    /// - 5000 ms
    async fn get_registry_timeout(&self) -> Result<Duration, Box<dyn Error + Send + Sync>>;

    /// 获取配置快照（JSON，写入重算审计日志）
    async fn get_config_snapshot_json(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}
