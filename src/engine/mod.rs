// ==========================================
// 集货分配系统 - 引擎层
// ==========================================
// 职责: 实现分配与成本规则,不拼 SQL
// 红线: Engine 不拼 SQL, 所有偏离完整分配的情况必须以数据输出
// ==========================================

pub mod affinity;
pub mod allocation;
pub mod cost;
pub mod error;
pub mod recalc;
pub mod snapshot;

// 重导出核心引擎
pub use affinity::{haversine_miles, rank_depots_by_distance};
pub use allocation::{AllocationEngine, AllocationInputs};
pub use cost::CostCalculator;
pub use error::{RecalcError, RecalcResult};
pub use recalc::{AllocationInputLoader, AllocationService, RecalcOutcome, SqliteInputLoader};
pub use snapshot::AllocationSnapshotStore;
