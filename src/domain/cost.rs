// ==========================================
// 集货分配系统 - 成本领域模型
// ==========================================
// 说明: 成本记录由分配集派生，不独立持久化
// 红线: 件数为 0 时单件成本为"未定义"，与计算得到的 0 成本区分展示
// ==========================================

use crate::domain::types::EntityRef;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 单件成本未定义时的展示文本
pub const UNDEFINED_COST_LABEL: &str = "N/A";

/// 计算单件成本
///
/// # 返回
/// - Some(total / parcels): parcels > 0
/// - None: parcels == 0（未定义，不是 0，也不是错误）
pub fn cost_per_parcel(total_cost: f64, parcels: u64) -> Option<f64> {
    if parcels == 0 {
        None
    } else {
        Some(total_cost / parcels as f64)
    }
}

// ==========================================
// CostRecord - 成本记录（按集货点或仓库）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub entity: EntityRef,
    pub date: NaiveDate,
    pub total_cost: f64,
    pub parcels: u64,
    pub trailer_loads: u64,
    pub cost_per_parcel: Option<f64>,
}

impl CostRecord {
    /// 单件成本展示文本（两位小数；未定义时为 "N/A"）
    pub fn cost_per_parcel_label(&self) -> String {
        match self.cost_per_parcel {
            Some(v) => format!("{:.2}", v),
            None => UNDEFINED_COST_LABEL.to_string(),
        }
    }
}

// ==========================================
// CostReport - 日度成本报表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub date: NaiveDate,
    pub by_cp: Vec<CostRecord>,
    pub by_depot: Vec<CostRecord>,
    pub total_cost: f64,
    pub total_parcels: u64,
    pub total_trailer_loads: u64,
    pub cost_per_parcel: Option<f64>,
}

impl CostReport {
    pub fn depot_record(&self, depot_id: &str) -> Option<&CostRecord> {
        self.by_depot
            .iter()
            .find(|r| matches!(&r.entity, EntityRef::Depot(id) if id == depot_id))
    }

    pub fn cp_record(&self, cp_id: &str) -> Option<&CostRecord> {
        self.by_cp
            .iter()
            .find(|r| matches!(&r.entity, EntityRef::Cp(id) if id == cp_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_per_parcel_defined() {
        assert_eq!(cost_per_parcel(1000.0, 250), Some(4.0));
    }

    #[test]
    fn test_cost_per_parcel_undefined_for_zero_parcels() {
        assert_eq!(cost_per_parcel(0.0, 0), None);
        assert_eq!(cost_per_parcel(200.0, 0), None);
    }

    #[test]
    fn test_label_distinguishes_undefined_from_zero() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let undefined = CostRecord {
            entity: EntityRef::Depot("D001".to_string()),
            date,
            total_cost: 0.0,
            parcels: 0,
            trailer_loads: 0,
            cost_per_parcel: None,
        };
        let zero = CostRecord {
            cost_per_parcel: Some(0.0),
            parcels: 10,
            ..undefined.clone()
        };
        assert_eq!(undefined.cost_per_parcel_label(), "N/A");
        assert_eq!(zero.cost_per_parcel_label(), "0.00");
    }
}
