// ==========================================
// 集货分配系统 - 查询 API
// ==========================================
// 职责: 按日期读取最新分配集，为下拉框/地图/明细/驾驶舱提供只读视图
// 红线: 日期范围内的集货点只来自 parcels > 0 的货量记录，不得使用全量集货点列表
// 红线: 分配集中存在的 (实体, 日期) 明细查询必须返回完整记录
// 红线: 只读，不修改任何登记数据
// ==========================================

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::allocation::{
    Allocation, AllocationSnapshot, OverAllocation, RecalcFailure, SkippedOverride,
    UnallocatedVolume,
};
use crate::domain::cost::{CostReport, UNDEFINED_COST_LABEL};
use crate::domain::types::{AllocationSource, EntityRef};
use crate::domain::{CollectionPoint, Depot};
use crate::engine::cost::CostCalculator;
use crate::engine::snapshot::AllocationSnapshotStore;
use crate::repository::{CapacityRepository, VolumeRepository};

// ==========================================
// 查询 DTO
// ==========================================

/// 分配列表过滤条件（均为可选，组合为 AND）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationFilter {
    pub cp_id: Option<String>,
    pub depot_id: Option<String>,
    pub source: Option<AllocationSource>,
}

impl AllocationFilter {
    fn matches(&self, a: &Allocation) -> bool {
        self.cp_id.as_deref().map_or(true, |id| a.cp_id == id)
            && self.depot_id.as_deref().map_or(true, |id| a.depot_id == id)
            && self.source.map_or(true, |s| a.source == s)
    }
}

/// 集货点标记（下拉框 / 地图）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpMarker {
    pub cp_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub parcels: u32,
}

/// 当日有分配的仓库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveDepot {
    pub depot_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: u32,
    pub allocated_parcels: u64,
    pub utilisation_pct: f64,
    pub over_allocated: bool,
}

/// 分配明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationDetail {
    pub entity: EntityRef,
    pub date: NaiveDate,
    pub snapshot_version: u64,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub allocations: Vec<Allocation>,
    pub total_parcels: u64,
    pub unallocated_parcels: u64,
    /// 仓库明细：当日有效产能；集货点明细为 None
    pub capacity: Option<u32>,
    pub over_allocated: bool,
    pub total_cost: f64,
    pub trailer_loads: u64,
    pub cost_per_parcel: Option<f64>,
    pub cost_per_parcel_label: String,
}

/// 集货点去向（含同仓库的其他集货点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpRouting {
    pub depot_id: String,
    pub depot_name: String,
    pub parcels: u32,
    pub source: AllocationSource,
    pub sibling_cp_ids: Vec<String>,
}

/// 仓库来源集货点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotInbound {
    pub cp_id: String,
    pub cp_name: String,
    pub parcels: u32,
    pub source: AllocationSource,
}

/// 驾驶舱统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub date: NaiveDate,
    pub snapshot_version: u64,
    pub active_cps: usize,
    pub total_parcels: u64,
    pub depots_used: usize,
    pub estimated_cost: f64,
    pub unallocated_parcels: u64,
    pub over_allocated_depots: usize,
    pub skipped_overrides: usize,
}

/// 地图连线（集货点 → 仓库）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLine {
    pub cp_id: String,
    pub depot_id: String,
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub parcels: u32,
    pub is_override: bool,
}

// ==========================================
// QueryApi - 查询 API
// ==========================================
pub struct QueryApi {
    snapshots: Arc<AllocationSnapshotStore>,
    capacity_repo: Arc<CapacityRepository>,
    volume_repo: Arc<VolumeRepository>,
    cost_calculator: CostCalculator,
}

impl QueryApi {
    /// 创建新的 QueryApi 实例
    ///
    /// # 参数
    /// - snapshots: 分配集快照仓库（与重算服务共享）
    /// - capacity_repo: 仓库主数据（名称/坐标）
    /// - volume_repo: 集货点主数据与日货量
    ///
    /// 成本视图使用快照中记录的成本模型，配置修改在下次重算后生效
    pub fn new(
        snapshots: Arc<AllocationSnapshotStore>,
        capacity_repo: Arc<CapacityRepository>,
        volume_repo: Arc<VolumeRepository>,
    ) -> Self {
        Self {
            snapshots,
            capacity_repo,
            volume_repo,
            cost_calculator: CostCalculator::new(),
        }
    }

    fn snapshot(&self, date: NaiveDate) -> ApiResult<Arc<AllocationSnapshot>> {
        self.snapshots
            .latest(date)
            .ok_or(ApiError::SnapshotMissing { date })
    }

    fn depot_index(&self) -> ApiResult<BTreeMap<String, Depot>> {
        Ok(self
            .capacity_repo
            .list_all()?
            .into_iter()
            .map(|d| (d.depot_id.clone(), d))
            .collect())
    }

    fn cp_index(&self, cp_ids: BTreeSet<String>) -> ApiResult<BTreeMap<String, CollectionPoint>> {
        Ok(self.volume_repo.list_cps_by_ids(&cp_ids)?)
    }

    // ==========================================
    // 分配列表
    // ==========================================

    /// 查询分配列表
    ///
    /// # 参数
    /// - date: 分配日期
    /// - filter: 过滤条件（None 返回全部）
    ///
    /// # 返回
    /// - Ok(Vec<Allocation>): 按分配集顺序
    /// - Err(SnapshotMissing): 该日期尚未计算
    pub fn list_allocations(
        &self,
        date: NaiveDate,
        filter: Option<&AllocationFilter>,
    ) -> ApiResult<Vec<Allocation>> {
        let snapshot = self.snapshot(date)?;
        Ok(snapshot
            .set
            .allocations
            .iter()
            .filter(|a| filter.map_or(true, |f| f.matches(a)))
            .cloned()
            .collect())
    }

    /// 查询当日有货量的集货点（下拉框/地图数据源）
    ///
    /// 只返回 parcels > 0 的集货点；不依赖分配集，未重算的日期也可查询
    pub fn list_cps_with_volume(&self, date: NaiveDate) -> ApiResult<Vec<CpMarker>> {
        let volumes = self.volume_repo.volumes_for_date(date)?;
        let cps = self.cp_index(volumes.keys().cloned().collect())?;

        let mut markers = Vec::with_capacity(volumes.len());
        for (cp_id, parcels) in volumes {
            match cps.get(&cp_id) {
                Some(cp) => markers.push(CpMarker {
                    cp_id,
                    name: cp.name.clone(),
                    latitude: cp.latitude,
                    longitude: cp.longitude,
                    parcels,
                }),
                None => warn!(cp_id = %cp_id, date = %date, "货量记录对应的集货点主数据缺失"),
            }
        }
        Ok(markers)
    }

    /// 查询当日至少有一条分配的仓库
    pub fn list_active_depots(&self, date: NaiveDate) -> ApiResult<Vec<ActiveDepot>> {
        let snapshot = self.snapshot(date)?;
        let depots = self.depot_index()?;

        Ok(snapshot
            .set
            .depot_loads
            .iter()
            .filter(|load| load.allocated_parcels > 0)
            .map(|load| {
                let depot = depots.get(&load.depot_id);
                ActiveDepot {
                    depot_id: load.depot_id.clone(),
                    name: depot.map_or_else(|| load.depot_id.clone(), |d| d.name.clone()),
                    latitude: depot.map_or(0.0, |d| d.latitude),
                    longitude: depot.map_or(0.0, |d| d.longitude),
                    capacity: load.capacity,
                    allocated_parcels: load.allocated_parcels,
                    utilisation_pct: load.utilisation_pct,
                    over_allocated: load.over_allocated,
                }
            })
            .collect())
    }

    // ==========================================
    // 明细
    // ==========================================

    /// 查询集货点或仓库的分配明细
    ///
    /// # 返回
    /// - Ok(Some(detail)): 实体出现在分配集中（有分配、未分配货量或为当日可用仓库）
    /// - Ok(None): 实体不在分配集中
    /// - Err(SnapshotMissing): 该日期尚未计算
    pub fn get_allocation_detail(
        &self,
        entity: &EntityRef,
        date: NaiveDate,
    ) -> ApiResult<Option<AllocationDetail>> {
        if entity.id().trim().is_empty() {
            return Err(ApiError::InvalidInput("实体ID不能为空".to_string()));
        }
        let snapshot = self.snapshot(date)?;
        let set = &snapshot.set;
        let report = self.cost_calculator.compute_costs(set, &snapshot.cost_model);

        match entity {
            EntityRef::Cp(cp_id) => {
                let allocations: Vec<Allocation> = set.allocations_for_cp(cp_id).cloned().collect();
                let unallocated_parcels: u64 = set
                    .unallocated
                    .iter()
                    .filter(|u| &u.cp_id == cp_id)
                    .map(|u| u.parcels as u64)
                    .sum();
                if allocations.is_empty() && unallocated_parcels == 0 {
                    return Ok(None);
                }

                let cp = self.volume_repo.find_cp(cp_id)?;
                let cost = report.cp_record(cp_id);
                Ok(Some(AllocationDetail {
                    entity: entity.clone(),
                    date,
                    snapshot_version: snapshot.version,
                    name: cp.as_ref().map_or_else(|| cp_id.clone(), |c| c.name.clone()),
                    latitude: cp.as_ref().map(|c| c.latitude),
                    longitude: cp.as_ref().map(|c| c.longitude),
                    total_parcels: allocations.iter().map(|a| a.parcels as u64).sum(),
                    allocations,
                    unallocated_parcels,
                    capacity: None,
                    over_allocated: false,
                    total_cost: cost.map_or(0.0, |c| c.total_cost),
                    trailer_loads: cost.map_or(0, |c| c.trailer_loads),
                    cost_per_parcel: cost.and_then(|c| c.cost_per_parcel),
                    cost_per_parcel_label: cost
                        .map_or_else(|| UNDEFINED_COST_LABEL.to_string(), |c| c.cost_per_parcel_label()),
                }))
            }
            EntityRef::Depot(depot_id) => {
                let allocations: Vec<Allocation> =
                    set.allocations_for_depot(depot_id).cloned().collect();
                let capacity = set.eligible_depots.get(depot_id).copied();
                if allocations.is_empty() && capacity.is_none() {
                    return Ok(None);
                }

                let depot = self.capacity_repo.find_by_id(depot_id)?;
                let cost = report.depot_record(depot_id);
                Ok(Some(AllocationDetail {
                    entity: entity.clone(),
                    date,
                    snapshot_version: snapshot.version,
                    name: depot.as_ref().map_or_else(|| depot_id.clone(), |d| d.name.clone()),
                    latitude: depot.as_ref().map(|d| d.latitude),
                    longitude: depot.as_ref().map(|d| d.longitude),
                    total_parcels: allocations.iter().map(|a| a.parcels as u64).sum(),
                    allocations,
                    unallocated_parcels: 0,
                    capacity,
                    over_allocated: set.is_over_allocated(depot_id),
                    total_cost: cost.map_or(0.0, |c| c.total_cost),
                    trailer_loads: cost.map_or(0, |c| c.trailer_loads),
                    cost_per_parcel: cost.and_then(|c| c.cost_per_parcel),
                    cost_per_parcel_label: cost
                        .map_or_else(|| UNDEFINED_COST_LABEL.to_string(), |c| c.cost_per_parcel_label()),
                }))
            }
        }
    }

    // ==========================================
    // 关系过滤
    // ==========================================

    /// 查询集货点去向及同仓库的其他集货点
    ///
    /// 集货点当日无分配时返回空列表
    pub fn routing_for_cp(&self, cp_id: &str, date: NaiveDate) -> ApiResult<Vec<CpRouting>> {
        let snapshot = self.snapshot(date)?;
        let set = &snapshot.set;
        let depots = self.depot_index()?;

        Ok(set
            .allocations_for_cp(cp_id)
            .map(|a| {
                let siblings: BTreeSet<&str> = set
                    .allocations_for_depot(&a.depot_id)
                    .map(|s| s.cp_id.as_str())
                    .filter(|id| *id != cp_id)
                    .collect();
                CpRouting {
                    depot_id: a.depot_id.clone(),
                    depot_name: depots
                        .get(&a.depot_id)
                        .map_or_else(|| a.depot_id.clone(), |d| d.name.clone()),
                    parcels: a.parcels,
                    source: a.source,
                    sibling_cp_ids: siblings.into_iter().map(str::to_string).collect(),
                }
            })
            .collect())
    }

    /// 查询分配到仓库的全部集货点
    pub fn cps_for_depot(&self, depot_id: &str, date: NaiveDate) -> ApiResult<Vec<DepotInbound>> {
        let snapshot = self.snapshot(date)?;
        let set = &snapshot.set;
        let cp_ids: BTreeSet<String> = set
            .allocations_for_depot(depot_id)
            .map(|a| a.cp_id.clone())
            .collect();
        let cps = self.cp_index(cp_ids)?;

        Ok(set
            .allocations_for_depot(depot_id)
            .map(|a| DepotInbound {
                cp_id: a.cp_id.clone(),
                cp_name: cps
                    .get(&a.cp_id)
                    .map_or_else(|| a.cp_id.clone(), |c| c.name.clone()),
                parcels: a.parcels,
                source: a.source,
            })
            .collect())
    }

    // ==========================================
    // 异常数据
    // ==========================================

    pub fn list_unallocated(&self, date: NaiveDate) -> ApiResult<Vec<UnallocatedVolume>> {
        Ok(self.snapshot(date)?.set.unallocated.clone())
    }

    pub fn list_over_allocations(&self, date: NaiveDate) -> ApiResult<Vec<OverAllocation>> {
        Ok(self.snapshot(date)?.set.over_allocations.clone())
    }

    pub fn list_skipped_overrides(&self, date: NaiveDate) -> ApiResult<Vec<SkippedOverride>> {
        Ok(self.snapshot(date)?.set.skipped_overrides.clone())
    }

    // ==========================================
    // 成本与驾驶舱
    // ==========================================

    /// 查询日度成本报表（使用该版本重算时的成本模型）
    pub fn cost_report(&self, date: NaiveDate) -> ApiResult<CostReport> {
        let snapshot = self.snapshot(date)?;
        Ok(self
            .cost_calculator
            .compute_costs(&snapshot.set, &snapshot.cost_model))
    }

    /// 驾驶舱统计
    pub fn dashboard_stats(&self, date: NaiveDate) -> ApiResult<DashboardStats> {
        let snapshot = self.snapshot(date)?;
        let set = &snapshot.set;
        let report = self.cost_calculator.compute_costs(set, &snapshot.cost_model);

        Ok(DashboardStats {
            date,
            snapshot_version: snapshot.version,
            active_cps: set.routed_cp_ids().len(),
            total_parcels: set.total_allocated(),
            depots_used: set.active_depot_ids().len(),
            estimated_cost: report.total_cost,
            unallocated_parcels: set.total_unallocated(),
            over_allocated_depots: set.over_allocations.len(),
            skipped_overrides: set.skipped_overrides.len(),
        })
    }

    /// 地图连线（缺少坐标的集货点/仓库不出线）
    pub fn map_lines(&self, date: NaiveDate) -> ApiResult<Vec<MapLine>> {
        let snapshot = self.snapshot(date)?;
        let set = &snapshot.set;
        let depots = self.depot_index()?;
        let cps = self.cp_index(set.routed_cp_ids().into_iter().map(str::to_string).collect())?;

        Ok(set
            .allocations
            .iter()
            .filter_map(|a| {
                let cp = cps.get(&a.cp_id)?;
                let depot = depots.get(&a.depot_id)?;
                Some(MapLine {
                    cp_id: a.cp_id.clone(),
                    depot_id: a.depot_id.clone(),
                    from: (cp.latitude, cp.longitude),
                    to: (depot.latitude, depot.longitude),
                    parcels: a.parcels,
                    is_override: a.source == AllocationSource::Override,
                })
            })
            .collect())
    }

    // ==========================================
    // 重算状态
    // ==========================================

    /// 最近一次重算失败（成功发布后清空）
    pub fn last_failure(&self, date: NaiveDate) -> Option<RecalcFailure> {
        self.snapshots.last_failure(date)
    }

    /// 当前分配集版本号（未计算时为 None）
    pub fn snapshot_version(&self, date: NaiveDate) -> Option<u64> {
        self.snapshots.latest(date).map(|s| s.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation(cp: &str, depot: &str, source: AllocationSource) -> Allocation {
        Allocation {
            cp_id: cp.to_string(),
            depot_id: depot.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            parcels: 10,
            source,
            distance_miles: None,
        }
    }

    #[test]
    fn test_filter_combines_conditions() {
        let filter = AllocationFilter {
            cp_id: None,
            depot_id: Some("D001".to_string()),
            source: Some(AllocationSource::Override),
        };
        assert!(filter.matches(&allocation("CP1", "D001", AllocationSource::Override)));
        assert!(!filter.matches(&allocation("CP1", "D001", AllocationSource::Automatic)));
        assert!(!filter.matches(&allocation("CP1", "D002", AllocationSource::Override)));
        assert!(AllocationFilter::default().matches(&allocation("X", "Y", AllocationSource::Automatic)));
    }
}
