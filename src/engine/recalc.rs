// ==========================================
// 集货分配系统 - 分配重算服务
// ==========================================
// 红线: 重算失败（无可用仓库/读取超时）时之前的分配集保持可见
// 红线: 读取登记数据带超时，超时为可重试错误
// ==========================================
// 职责: 读取登记数据 → 分配引擎 → 发布快照 → 审计
// 并发: 多个日期可并发重算（各自独立的 tokio 任务）
// ==========================================

mod loader;
mod service;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use loader::{AllocationInputLoader, SqliteInputLoader};
pub use service::AllocationService;

// ==========================================
// RecalcOutcome - 单日重算摘要
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalcOutcome {
    pub date: NaiveDate,
    pub version: u64,                 // 发布的快照版本
    pub allocation_count: usize,      // 分配记录数
    pub allocated_parcels: u64,       // 已分配件数
    pub unallocated_parcels: u64,     // 未分配件数
    pub over_allocated_depots: usize, // 覆写导致超配的仓库数
    pub skipped_overrides: usize,     // 目标失效被跳过的覆写数
    pub elapsed_ms: i64,              // 耗时(毫秒)
}
