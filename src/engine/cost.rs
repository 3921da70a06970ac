// ==========================================
// 集货分配系统 - 成本计算器
// ==========================================
// 职责: 由已定稿的分配集派生按集货点/按仓库成本
// 红线: 件数为 0 时单件成本为 None（未定义），不是 0，也不是错误
// ==========================================

use crate::config::cost_model::CostModel;
use crate::domain::allocation::{Allocation, AllocationSet};
use crate::domain::cost::{cost_per_parcel, CostRecord, CostReport};
use crate::domain::types::EntityRef;
use std::collections::BTreeMap;
use tracing::instrument;

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    cost: f64,
    parcels: u64,
    loads: u64,
}

impl Accumulator {
    fn add(&mut self, cost: f64, parcels: u64, loads: u64) {
        self.cost += cost;
        self.parcels += parcels;
        self.loads += loads;
    }
}

// ==========================================
// CostCalculator - 成本计算器
// ==========================================
pub struct CostCalculator {}

impl CostCalculator {
    pub fn new() -> Self {
        Self {}
    }

    /// 单条分配的成本
    ///
    /// # 返回
    /// (成本, 车次)
    pub fn allocation_cost(&self, allocation: &Allocation, model: &CostModel) -> (f64, u64) {
        let parcels = allocation.parcels as u64;
        match model {
            CostModel::PerRoute {
                base,
                per_mile,
                minimum,
                parcels_per_trailer,
            } => {
                let per_trailer = (*parcels_per_trailer).max(1) as u64;
                let loads = parcels.div_ceil(per_trailer);
                let miles = allocation.distance_miles.unwrap_or(0.0);
                let per_load = (base + per_mile * miles).max(*minimum);
                (round_cents(per_load * loads as f64), loads)
            }
            CostModel::PerParcel { rate } => (round_cents(rate * parcels as f64), 0),
        }
    }

    /// 计算分配集成本报表
    ///
    /// # 说明
    /// - by_depot 覆盖当日全部可用仓库（零货量仓库单件成本为 None）
    /// - by_cp 覆盖当日全部有分配的集货点
    #[instrument(skip(self, set, model), fields(date = %set.date, model = model.name()))]
    pub fn compute_costs(&self, set: &AllocationSet, model: &CostModel) -> CostReport {
        let mut by_cp: BTreeMap<&str, Accumulator> = BTreeMap::new();
        let mut by_depot: BTreeMap<&str, Accumulator> = set
            .eligible_depots
            .keys()
            .map(|id| (id.as_str(), Accumulator::default()))
            .collect();

        for allocation in &set.allocations {
            let (cost, loads) = self.allocation_cost(allocation, model);
            let parcels = allocation.parcels as u64;
            by_cp
                .entry(allocation.cp_id.as_str())
                .or_default()
                .add(cost, parcels, loads);
            by_depot
                .entry(allocation.depot_id.as_str())
                .or_default()
                .add(cost, parcels, loads);
        }

        let to_record = |entity: EntityRef, acc: &Accumulator| CostRecord {
            entity,
            date: set.date,
            total_cost: round_cents(acc.cost),
            parcels: acc.parcels,
            trailer_loads: acc.loads,
            cost_per_parcel: cost_per_parcel(acc.cost, acc.parcels),
        };

        let cp_records: Vec<CostRecord> = by_cp
            .iter()
            .map(|(id, acc)| to_record(EntityRef::Cp(id.to_string()), acc))
            .collect();
        let depot_records: Vec<CostRecord> = by_depot
            .iter()
            .map(|(id, acc)| to_record(EntityRef::Depot(id.to_string()), acc))
            .collect();

        let total_cost: f64 = cp_records.iter().map(|r| r.total_cost).sum();
        let total_parcels: u64 = cp_records.iter().map(|r| r.parcels).sum();
        let total_trailer_loads: u64 = cp_records.iter().map(|r| r.trailer_loads).sum();

        CostReport {
            date: set.date,
            by_cp: cp_records,
            by_depot: depot_records,
            total_cost: round_cents(total_cost),
            total_parcels,
            total_trailer_loads,
            cost_per_parcel: cost_per_parcel(total_cost, total_parcels),
        }
    }
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::AllocationSource;
    use chrono::NaiveDate;

    fn alloc(parcels: u32, miles: Option<f64>) -> Allocation {
        Allocation {
            cp_id: "CP001".to_string(),
            depot_id: "D001".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            parcels,
            source: AllocationSource::Automatic,
            distance_miles: miles,
        }
    }

    #[test]
    fn test_route_cost_applies_minimum() {
        let calc = CostCalculator::new();
        let model = CostModel::default();
        // 150 + 1.8 × 10 = 168 < 200
        assert_eq!(calc.allocation_cost(&alloc(300, Some(10.0)), &model), (200.0, 1));
        // 150 + 1.8 × 100 = 330
        assert_eq!(calc.allocation_cost(&alloc(300, Some(100.0)), &model), (330.0, 1));
    }

    #[test]
    fn test_route_cost_counts_trailer_loads() {
        let calc = CostCalculator::new();
        let model = CostModel::default();
        assert_eq!(calc.allocation_cost(&alloc(2500, Some(100.0)), &model), (990.0, 3));
    }

    #[test]
    fn test_missing_distance_is_zero_miles() {
        let calc = CostCalculator::new();
        let model = CostModel::PerRoute {
            base: 150.0,
            per_mile: 1.8,
            minimum: 0.0,
            parcels_per_trailer: 1000,
        };
        assert_eq!(calc.allocation_cost(&alloc(10, None), &model), (150.0, 1));
    }
}
