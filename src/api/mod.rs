// ==========================================
// 集货分配系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 CLI / 上层服务调用
// ==========================================

pub mod capacity_api;
pub mod error;
pub mod override_api;
pub mod query_api;

// 重导出核心类型
pub use capacity_api::CapacityApi;
pub use error::{ApiError, ApiResult};
pub use override_api::OverrideApi;
pub use query_api::{
    ActiveDepot, AllocationDetail, AllocationFilter, CpMarker, CpRouting, DashboardStats,
    DepotInbound, MapLine, QueryApi,
};
