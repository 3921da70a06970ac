// ==========================================
// 查询 API 集成测试
// ==========================================
// 测试范围:
// 1. 日期范围集货点（406 个中只有 12 个有货量）
// 2. 明细查询完整性（分配集中每个集货点/仓库都有完整明细）
// 3. 关系过滤（集货点 → 仓库 + 同仓库集货点；仓库 → 集货点）
// 4. 有分配仓库列表、驾驶舱统计、地图连线
// 5. 未计算日期返回 SnapshotMissing
// ==========================================

mod test_helpers;

use freight_routing::api::{AllocationFilter, ApiError};
use freight_routing::domain::{AllocationSource, EntityRef, OverrideDraft};
use std::collections::BTreeSet;
use test_helpers::{cp, date, seed_small_network, TestContext};

#[test]
fn test_cp_selector_only_lists_cps_with_volume() {
    let ctx = TestContext::new();
    let cps: Vec<_> = (0..406)
        .map(|i| {
            cp(
                &format!("CP{:03}", i),
                &format!("COLLECTION {}", i),
                51.0 + i as f64 * 0.001,
                -0.5 + i as f64 * 0.001,
            )
        })
        .collect();
    ctx.add_cps(&cps);

    let d = date(2026, 1, 6);
    let with_volume: BTreeSet<String> = (0..12).map(|i| format!("CP{:03}", i * 31)).collect();
    for cp_id in &with_volume {
        ctx.add_volume(cp_id, d, 40);
    }
    // 零货量记录与其他日期的货量都不应出现
    ctx.add_volume("CP400", d, 0);
    ctx.add_volume("CP401", date(2026, 1, 7), 90);

    let markers = ctx.query_api.list_cps_with_volume(d).unwrap();
    let listed: BTreeSet<String> = markers.iter().map(|m| m.cp_id.clone()).collect();

    assert_eq!(markers.len(), 12);
    assert_eq!(listed, with_volume);
    assert!(markers.iter().all(|m| m.parcels == 40 && !m.name.is_empty()));
    assert_eq!(
        ctx.volume_repo.list_cps_with_volume(d).unwrap().len(),
        12
    );
}

#[tokio::test]
async fn test_detail_is_fully_populated_for_every_entity_in_set() {
    let ctx = TestContext::new();
    seed_small_network(&ctx);
    let d = date(2026, 1, 6);
    ctx.add_volume("CP_CAM", d, 320);
    ctx.add_volume("CP_ISL", d, 260);
    ctx.add_volume("CP_BRA", d, 180);
    ctx.add_volume("CP_WIC", d, 150);
    ctx.service.recalc_date(d, "test").await.unwrap();

    let set = ctx.snapshots.latest(d).unwrap().set.clone();
    for cp_id in set.routed_cp_ids() {
        let detail = ctx
            .query_api
            .get_allocation_detail(&EntityRef::Cp(cp_id.to_string()), d)
            .unwrap()
            .unwrap_or_else(|| panic!("{} 明细为空", cp_id));
        assert!(!detail.name.is_empty());
        assert!(detail.latitude.is_some() && detail.longitude.is_some());
        assert!(!detail.allocations.is_empty());
        assert!(detail.total_parcels > 0);
        assert!(detail.total_cost > 0.0);
        assert!(detail.cost_per_parcel.is_some());
    }
    for depot_id in set.active_depot_ids() {
        let detail = ctx
            .query_api
            .get_allocation_detail(&EntityRef::Depot(depot_id.to_string()), d)
            .unwrap()
            .unwrap_or_else(|| panic!("{} 明细为空", depot_id));
        assert!(detail.capacity.unwrap_or(0) > 0);
        assert_eq!(detail.total_parcels, set.parcels_to_depot(depot_id));
        assert!(detail.latitude.is_some());
    }

    // 零产能仓库不在分配集中
    let basildon = ctx
        .query_api
        .get_allocation_detail(&EntityRef::Depot("D_BAS".to_string()), d)
        .unwrap();
    assert!(basildon.is_none());
    let unknown = ctx
        .query_api
        .get_allocation_detail(&EntityRef::Cp("NOPE".to_string()), d)
        .unwrap();
    assert!(unknown.is_none());
}

#[tokio::test]
async fn test_routing_relations_between_cps_and_depots() {
    let ctx = TestContext::new();
    seed_small_network(&ctx);
    let d = date(2026, 1, 6);
    ctx.add_volume("CP_CAM", d, 200);
    ctx.add_volume("CP_ISL", d, 200);
    ctx.add_volume("CP_BRA", d, 100);
    ctx.service.recalc_date(d, "test").await.unwrap();

    // 坎登与伊斯灵顿都去伦敦
    let routing = ctx.query_api.routing_for_cp("CP_CAM", d).unwrap();
    assert_eq!(routing.len(), 1);
    assert_eq!(routing[0].depot_id, "D_LON");
    assert_eq!(routing[0].depot_name, "LONDON");
    assert_eq!(routing[0].sibling_cp_ids, vec!["CP_ISL".to_string()]);

    let inbound = ctx.query_api.cps_for_depot("D_LON", d).unwrap();
    let ids: Vec<&str> = inbound.iter().map(|i| i.cp_id.as_str()).collect();
    assert_eq!(ids, vec!["CP_CAM", "CP_ISL"]);
    assert_eq!(inbound[0].cp_name, "CAMDEN");

    let che = ctx.query_api.cps_for_depot("D_CHE", d).unwrap();
    assert_eq!(che.len(), 1);
    assert_eq!(che[0].cp_id, "CP_BRA");

    // 当日无分配的集货点
    assert!(ctx.query_api.routing_for_cp("CP_WIC", d).unwrap().is_empty());
}

#[tokio::test]
async fn test_active_depots_dashboard_and_map_lines() {
    let ctx = TestContext::new();
    seed_small_network(&ctx);
    let d = date(2026, 1, 6);
    ctx.add_volume("CP_CAM", d, 300);
    ctx.add_volume("CP_WIC", d, 100);
    ctx.override_api
        .create_override(
            &OverrideDraft {
                cp_id: "CP_WIC".to_string(),
                date: d,
                depot_id: "D_LON".to_string(),
                volume: None,
            },
            "ops",
        )
        .unwrap();
    ctx.service.recalc_date(d, "test").await.unwrap();

    let active = ctx.query_api.list_active_depots(d).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].depot_id, "D_LON");
    assert_eq!(active[0].allocated_parcels, 400);
    assert_eq!(active[0].utilisation_pct, 80.0);

    let stats = ctx.query_api.dashboard_stats(d).unwrap();
    assert_eq!(stats.active_cps, 2);
    assert_eq!(stats.total_parcels, 400);
    assert_eq!(stats.depots_used, 1);
    assert_eq!(stats.unallocated_parcels, 0);
    assert!(stats.estimated_cost > 0.0);

    let lines = ctx.query_api.map_lines(d).unwrap();
    assert_eq!(lines.len(), 2);
    let wic = lines.iter().find(|l| l.cp_id == "CP_WIC").unwrap();
    assert!(wic.is_override);
    assert_eq!(wic.to, (51.5074, -0.1278));

    let overrides_only = ctx
        .query_api
        .list_allocations(
            d,
            Some(&AllocationFilter {
                source: Some(AllocationSource::Override),
                ..Default::default()
            }),
        )
        .unwrap();
    assert_eq!(overrides_only.len(), 1);
    assert_eq!(overrides_only[0].cp_id, "CP_WIC");
}

#[test]
fn test_missing_snapshot_is_reported() {
    let ctx = TestContext::new();
    let d = date(2026, 2, 1);
    let err = ctx.query_api.list_allocations(d, None).unwrap_err();
    assert!(matches!(err, ApiError::SnapshotMissing { date: missing } if missing == d));
    assert!(ctx.query_api.snapshot_version(d).is_none());
    assert!(ctx.query_api.last_failure(d).is_none());
}
