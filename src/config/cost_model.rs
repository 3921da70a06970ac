// ==========================================
// 集货分配系统 - 成本模型配置
// ==========================================
// 存储: config_kv (cost_model + cost_* 参数)
// ==========================================

use serde::{Deserialize, Serialize};

/// 按线路计价默认参数（英镑）
pub const DEFAULT_ROUTE_BASE: f64 = 150.0;
pub const DEFAULT_ROUTE_PER_MILE: f64 = 1.80;
pub const DEFAULT_ROUTE_MINIMUM: f64 = 200.0;
pub const DEFAULT_PARCELS_PER_TRAILER: u32 = 1000;

/// 按件计价默认单价
pub const DEFAULT_PER_PARCEL_RATE: f64 = 0.50;

// ==========================================
// CostModel - 成本模型
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostModel {
    /// 单车成本 = max(base + per_mile × 距离, minimum)，车次 = ceil(件数 / 单车件数)
    PerRoute {
        base: f64,
        per_mile: f64,
        minimum: f64,
        parcels_per_trailer: u32,
    },
    /// 按件计价
    PerParcel { rate: f64 },
}

impl CostModel {
    pub fn name(&self) -> &'static str {
        match self {
            CostModel::PerRoute { .. } => "PER_ROUTE",
            CostModel::PerParcel { .. } => "PER_PARCEL",
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel::PerRoute {
            base: DEFAULT_ROUTE_BASE,
            per_mile: DEFAULT_ROUTE_PER_MILE,
            minimum: DEFAULT_ROUTE_MINIMUM,
            parcels_per_trailer: DEFAULT_PARCELS_PER_TRAILER,
        }
    }
}
