// ==========================================
// 集货分配系统 - 核心库
// ==========================================
// 职责: 集货点 → 仓库 日度货量分配、人工覆写、成本核算、只读查询
// 技术栈: Rust + SQLite + tokio
// 系统定位: 决策支持系统 (人工覆写优先)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配/成本/重算
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AllocationSource, EntityRef, OverrideSkipReason, UnallocatedReason};

// 领域实体
pub use domain::{
    ActionLog, ActionType, AffinityTable, Allocation, AllocationSet, CollectionPoint, CostRecord,
    CostReport, Depot, ManualOverride, OverrideDraft, UnallocatedVolume,
};

// 引擎
pub use engine::{
    AllocationEngine, AllocationInputs, AllocationService, AllocationSnapshotStore,
    CostCalculator, RecalcError,
};

// API
pub use api::{ApiError, ApiResult, CapacityApi, OverrideApi, QueryApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "集货分配系统";
