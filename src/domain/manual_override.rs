// ==========================================
// 集货分配系统 - 人工覆写领域模型
// ==========================================
// 红线: 覆写必须被精确执行，并在自动分配之前计入目标仓库产能
// 约束: 同一 (cp_id, date) 仅允许一条覆写
// 并发: version 为每个 (cp_id, date) 的乐观锁计数器
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ManualOverride - 人工覆写
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOverride {
    pub cp_id: String,        // 集货点
    pub date: NaiveDate,      // 生效日期
    pub depot_id: String,     // 强制目标仓库
    pub volume: Option<u32>,  // 限定件数（None 表示使用当日货量）
    pub version: i64,         // 乐观锁版本（创建时为 1）
    pub created_by: String,   // 操作人
    pub updated_at: NaiveDateTime,
}

impl ManualOverride {
    /// 计算覆写实际路由件数
    ///
    /// # 参数
    /// - `registry_volume`: 货量登记中的当日货量
    pub fn routed_volume(&self, registry_volume: u32) -> u32 {
        self.volume.unwrap_or(registry_volume)
    }
}

// ==========================================
// OverrideDraft - 覆写写入请求
// ==========================================
// 用途: 创建/更新时的输入，不含版本与审计字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideDraft {
    pub cp_id: String,
    pub date: NaiveDate,
    pub depot_id: String,
    #[serde(default)]
    pub volume: Option<u32>,
}
