// ==========================================
// 集货分配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod affinity;
pub mod allocation;
pub mod collection_point;
pub mod cost;
pub mod depot;
pub mod manual_override;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use affinity::{AffinityEntry, AffinityTable};
pub use allocation::{
    Allocation, AllocationSet, AllocationSnapshot, DepotLoad, OverAllocation, RecalcFailure,
    SkippedOverride, UnallocatedVolume,
};
pub use collection_point::{CollectionPoint, VolumeRecord};
pub use cost::{cost_per_parcel, CostRecord, CostReport, UNDEFINED_COST_LABEL};
pub use depot::{CapacityOverride, Depot};
pub use manual_override::{ManualOverride, OverrideDraft};
pub use types::{AllocationSource, EntityRef, OverrideSkipReason, UnallocatedReason};
