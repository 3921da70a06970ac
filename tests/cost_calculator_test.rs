// ==========================================
// 成本计算集成测试
// ==========================================
// 测试范围:
// 1. 单件成本 = 总成本 / 件数（1000 / 250 = 4.0）
// 2. 零件数仓库单件成本未定义（与 0 区分）
// 3. 线路成本模型（起步价/里程/最低收费/车次）
// 4. 配置驱动的成本模型切换（按重算时的配置计算）
// ==========================================

mod test_helpers;

use freight_routing::config::{config_keys, CostModel};
use freight_routing::domain::{
    Allocation, AllocationSet, AllocationSource, EntityRef, UNDEFINED_COST_LABEL,
};
use freight_routing::engine::CostCalculator;
use std::collections::BTreeMap;
use test_helpers::{cp, date, depot, TestContext};

fn allocation(cp_id: &str, depot_id: &str, parcels: u32, miles: f64) -> Allocation {
    Allocation {
        cp_id: cp_id.to_string(),
        depot_id: depot_id.to_string(),
        date: date(2026, 1, 6),
        parcels,
        source: AllocationSource::Automatic,
        distance_miles: Some(miles),
    }
}

fn set_with(allocations: Vec<Allocation>, depots: &[(&str, u32)]) -> AllocationSet {
    AllocationSet {
        date: date(2026, 1, 6),
        eligible_depots: depots
            .iter()
            .map(|(id, c)| (id.to_string(), *c))
            .collect::<BTreeMap<_, _>>(),
        allocations,
        unallocated: Vec::new(),
        over_allocations: Vec::new(),
        skipped_overrides: Vec::new(),
        depot_loads: Vec::new(),
    }
}

#[test]
fn test_cost_per_parcel_is_total_over_parcels() {
    let calc = CostCalculator::new();
    let set = set_with(
        vec![
            allocation("CP1", "D1", 100, 12.0),
            allocation("CP2", "D1", 150, 30.0),
        ],
        &[("D1", 500)],
    );
    let report = calc.compute_costs(&set, &CostModel::PerParcel { rate: 4.0 });

    let d1 = report.depot_record("D1").unwrap();
    assert_eq!(d1.parcels, 250);
    assert_eq!(d1.total_cost, 1000.0);
    assert_eq!(d1.cost_per_parcel, Some(4.0));
    assert_eq!(report.cost_per_parcel, Some(4.0));
    assert_eq!(report.total_trailer_loads, 0);
}

#[test]
fn test_zero_parcel_depot_has_undefined_cost_per_parcel() {
    let calc = CostCalculator::new();
    let set = set_with(
        vec![allocation("CP1", "D1", 10, 5.0)],
        &[("D1", 100), ("D2", 100)],
    );
    let report = calc.compute_costs(&set, &CostModel::default());

    let d2 = report.depot_record("D2").unwrap();
    assert_eq!(d2.parcels, 0);
    assert_eq!(d2.total_cost, 0.0);
    assert_eq!(d2.cost_per_parcel, None);
    assert_eq!(d2.cost_per_parcel_label(), UNDEFINED_COST_LABEL);

    // by_cp 只包含有分配的集货点
    assert_eq!(report.by_cp.len(), 1);
    assert_eq!(report.by_cp[0].entity, EntityRef::Cp("CP1".to_string()));
}

#[test]
fn test_empty_set_cost_is_undefined_not_zero() {
    let calc = CostCalculator::new();
    let report = calc.compute_costs(&set_with(Vec::new(), &[("D1", 100)]), &CostModel::default());
    assert_eq!(report.total_parcels, 0);
    assert_eq!(report.cost_per_parcel, None);
}

#[test]
fn test_route_model_costs_per_trailer_load() {
    let calc = CostCalculator::new();
    let model = CostModel::PerRoute {
        base: 150.0,
        per_mile: 1.8,
        minimum: 200.0,
        parcels_per_trailer: 1000,
    };
    // CP1: 1 车 × max(150 + 1.8 × 100, 200) = 330
    // CP2: 2 车 × max(150 + 1.8 × 10, 200) = 400
    let set = set_with(
        vec![
            allocation("CP1", "D1", 800, 100.0),
            allocation("CP2", "D1", 1_200, 10.0),
        ],
        &[("D1", 5_000)],
    );
    let report = calc.compute_costs(&set, &model);

    assert_eq!(report.cp_record("CP1").unwrap().total_cost, 330.0);
    assert_eq!(report.cp_record("CP2").unwrap().total_cost, 400.0);
    assert_eq!(report.cp_record("CP2").unwrap().trailer_loads, 2);
    assert_eq!(report.total_cost, 730.0);
    assert_eq!(report.total_trailer_loads, 3);
    assert_eq!(report.cost_per_parcel, Some(730.0 / 2_000.0));
}

#[tokio::test]
async fn test_cost_report_follows_configured_model() {
    let ctx = TestContext::new();
    ctx.add_depots(&[
        depot("D1", "LONDON", 51.5074, -0.1278, 1_000),
        depot("D2", "READING", 51.4543, -0.9781, 1_000),
    ]);
    ctx.add_cps(&[cp("CP1", "CAMDEN", 51.5390, -0.1426)]);
    ctx.rebuild_affinity();
    let d = date(2026, 1, 6);
    ctx.add_volume("CP1", d, 250);

    ctx.set_config(config_keys::COST_MODEL, "PER_PARCEL");
    ctx.set_config(config_keys::COST_PER_PARCEL_RATE, "4.0");
    ctx.service.recalc_date(d, "test").await.unwrap();

    let report = ctx.query_api.cost_report(d).unwrap();
    assert_eq!(report.total_cost, 1000.0);
    assert_eq!(report.cost_per_parcel, Some(4.0));
    assert_eq!(report.depot_record("D1").unwrap().cost_per_parcel, Some(4.0));
    assert_eq!(report.depot_record("D2").unwrap().cost_per_parcel_label(), "N/A");

    // 成本视图跟随分配集：配置变更在下次重算前不生效
    ctx.set_config(config_keys::COST_PER_PARCEL_RATE, "abc");
    let report = ctx.query_api.cost_report(d).unwrap();
    assert_eq!(report.total_cost, 1000.0);
    let detail = ctx
        .query_api
        .get_allocation_detail(&EntityRef::Depot("D1".to_string()), d)
        .unwrap()
        .unwrap();
    assert_eq!(detail.total_cost, 1000.0);

    // 非法配置值回落默认费率
    ctx.service.recalc_date(d, "test").await.unwrap();
    let report = ctx.query_api.cost_report(d).unwrap();
    assert_eq!(report.total_cost, 125.0);
    assert_eq!(ctx.snapshots.latest(d).unwrap().version, 2);
}
