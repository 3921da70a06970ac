// ==========================================
// 集货分配系统 - 分配引擎
// ==========================================
// 红线: 零产能/停用仓库永远不是分配目标
// 红线: 人工覆写先于自动分配执行，且计入目标仓库产能
// 红线: 相同输入必须得到相同分配集（集货点按 cp_id 升序处理）
// ==========================================
// 职责: 单日分配计算（纯函数，不访问数据库）
// 输入: AllocationInputs + AffinityTable（按次传入）
// 输出: AllocationSet
// ==========================================

use crate::domain::affinity::AffinityTable;
use crate::domain::allocation::{
    Allocation, AllocationSet, DepotLoad, OverAllocation, SkippedOverride, UnallocatedVolume,
};
use crate::domain::manual_override::ManualOverride;
use crate::domain::types::{AllocationSource, OverrideSkipReason, UnallocatedReason};
use crate::engine::error::{RecalcError, RecalcResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};

// ==========================================
// AllocationInputs - 单日分配输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationInputs {
    pub date: NaiveDate,
    /// 可用仓库 → 当日有效产能（已排除零产能/停用仓库）
    pub eligible_depots: BTreeMap<String, u32>,
    /// 集货点 → 当日货量（仅正值）
    pub volumes: BTreeMap<String, u32>,
    pub overrides: Vec<ManualOverride>,
}

// ==========================================
// AllocationEngine - 分配引擎
// ==========================================
pub struct AllocationEngine {
    // 无状态引擎，不需要注入依赖
}

impl AllocationEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 计算单日分配集
    ///
    /// 步骤：
    /// 1) 无可用仓库 → NoEligibleDepots
    /// 2) 剩余产能 = 有效产能
    /// 3) 按 cp_id 顺序执行覆写（超出产能时记满额并标记超配）
    /// 4) 其余有货量的集货点按 cp_id 顺序自动分配，按偏好顺序拆分
    /// 5) 无处可放的剩余货量记为 UnallocatedVolume
    ///
    /// # 参数
    /// - `inputs`: 当日输入
    /// - `affinity`: 集货点偏好表
    ///
    /// # 返回
    /// - Ok(AllocationSet)
    /// - Err(NoEligibleDepots)
    #[instrument(skip(self, inputs, affinity), fields(
        date = %inputs.date,
        eligible_depots = inputs.eligible_depots.len(),
        cps_with_volume = inputs.volumes.len(),
        overrides = inputs.overrides.len()
    ))]
    pub fn allocate(
        &self,
        inputs: &AllocationInputs,
        affinity: &AffinityTable,
    ) -> RecalcResult<AllocationSet> {
        let date = inputs.date;

        // 1. 可用仓库
        if inputs.eligible_depots.is_empty() {
            return Err(RecalcError::NoEligibleDepots { date });
        }

        // 2. 剩余产能
        let mut remaining: BTreeMap<&str, u32> = inputs
            .eligible_depots
            .iter()
            .map(|(id, cap)| (id.as_str(), *cap))
            .collect();

        let mut allocations = Vec::new();
        let mut unallocated = Vec::new();
        let mut skipped_overrides = Vec::new();
        let mut over_allocated: BTreeSet<&str> = BTreeSet::new();
        let mut covered: BTreeSet<&str> = BTreeSet::new();

        // 3. 覆写
        let mut overrides: Vec<&ManualOverride> = inputs.overrides.iter().collect();
        overrides.sort_by(|a, b| a.cp_id.cmp(&b.cp_id));

        for o in overrides {
            if covered.contains(o.cp_id.as_str()) {
                warn!(cp_id = %o.cp_id, "同一集货点存在多条覆写，仅执行第一条");
                continue;
            }
            let Some(rem) = remaining.get_mut(o.depot_id.as_str()) else {
                // 写入后目标仓库变为不可用：跳过覆写，集货点回落自动分配
                warn!(cp_id = %o.cp_id, depot_id = %o.depot_id, "覆写目标仓库当日不可用，回落自动分配");
                skipped_overrides.push(SkippedOverride {
                    cp_id: o.cp_id.clone(),
                    depot_id: o.depot_id.clone(),
                    reason: OverrideSkipReason::TargetIneligible,
                });
                continue;
            };
            covered.insert(o.cp_id.as_str());

            let registry_volume = inputs.volumes.get(&o.cp_id).copied().unwrap_or(0);
            let routed = o.routed_volume(registry_volume);

            if routed > 0 {
                if routed > *rem {
                    *rem = 0;
                    over_allocated.insert(o.depot_id.as_str());
                } else {
                    *rem -= routed;
                }
                allocations.push(Allocation {
                    cp_id: o.cp_id.clone(),
                    depot_id: o.depot_id.clone(),
                    date,
                    parcels: routed,
                    source: AllocationSource::Override,
                    distance_miles: affinity.distance(&o.cp_id, &o.depot_id),
                });
            }

            if routed < registry_volume {
                unallocated.push(UnallocatedVolume {
                    cp_id: o.cp_id.clone(),
                    date,
                    parcels: registry_volume - routed,
                    reason: UnallocatedReason::OverrideCapped,
                });
            }
        }

        // 4./5. 自动分配
        for (cp_id, &volume) in &inputs.volumes {
            if volume == 0 || covered.contains(cp_id.as_str()) {
                continue;
            }

            let mut outstanding = volume;
            for depot_id in candidate_order(cp_id, &inputs.eligible_depots, affinity) {
                if outstanding == 0 {
                    break;
                }
                let Some(rem) = remaining.get_mut(depot_id) else {
                    continue;
                };
                if *rem == 0 {
                    continue;
                }
                let placed = outstanding.min(*rem);
                *rem -= placed;
                outstanding -= placed;
                allocations.push(Allocation {
                    cp_id: cp_id.clone(),
                    depot_id: depot_id.to_string(),
                    date,
                    parcels: placed,
                    source: AllocationSource::Automatic,
                    distance_miles: affinity.distance(cp_id, depot_id),
                });
            }

            if outstanding > 0 {
                debug!(cp_id = %cp_id, parcels = outstanding, "可用仓库产能耗尽");
                unallocated.push(UnallocatedVolume {
                    cp_id: cp_id.clone(),
                    date,
                    parcels: outstanding,
                    reason: UnallocatedReason::CapacityExhausted,
                });
            }
        }

        // 6./7. 稳定排序：cp_id → 来源（覆写在前）→ 放置顺序
        allocations.sort_by(|a, b| a.cp_id.cmp(&b.cp_id).then(a.source.cmp(&b.source)));
        unallocated.sort_by(|a, b| a.cp_id.cmp(&b.cp_id));

        let mut set = AllocationSet {
            date,
            eligible_depots: inputs.eligible_depots.clone(),
            allocations,
            unallocated,
            over_allocations: Vec::new(),
            skipped_overrides,
            depot_loads: Vec::new(),
        };

        set.over_allocations = over_allocated
            .iter()
            .map(|depot_id| {
                let capacity = inputs.eligible_depots.get(*depot_id).copied().unwrap_or(0);
                let allocated = set.parcels_to_depot(depot_id);
                OverAllocation {
                    depot_id: depot_id.to_string(),
                    capacity,
                    allocated,
                    excess: allocated.saturating_sub(capacity as u64),
                }
            })
            .collect();
        set.depot_loads = summarize_depot_loads(&set);

        debug!(
            allocations = set.allocations.len(),
            unallocated_parcels = set.total_unallocated(),
            over_allocated = set.over_allocations.len(),
            "分配计算完成"
        );
        Ok(set)
    }
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 集货点候选仓库顺序
///
/// 偏好表中的可用仓库（按偏好顺序）在前，其余可用仓库按 depot_id 升序在后
fn candidate_order<'a>(
    cp_id: &str,
    eligible: &'a BTreeMap<String, u32>,
    affinity: &AffinityTable,
) -> Vec<&'a str> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut order = Vec::with_capacity(eligible.len());
    for preferred in affinity.preference_order(cp_id) {
        if let Some((id, _)) = eligible.get_key_value(preferred) {
            if seen.insert(id.as_str()) {
                order.push(id.as_str());
            }
        }
    }
    for id in eligible.keys() {
        if seen.insert(id.as_str()) {
            order.push(id.as_str());
        }
    }
    order
}

/// 汇总当日有分配的仓库负载
fn summarize_depot_loads(set: &AllocationSet) -> Vec<DepotLoad> {
    set.active_depot_ids()
        .into_iter()
        .map(|depot_id| {
            let capacity = set.eligible_depots.get(depot_id).copied().unwrap_or(0);
            let allocated = set.parcels_to_depot(depot_id);
            let utilisation_pct = if capacity == 0 {
                0.0
            } else {
                (allocated as f64 / capacity as f64 * 1000.0).round() / 10.0
            };
            DepotLoad {
                depot_id: depot_id.to_string(),
                capacity,
                allocated_parcels: allocated,
                utilisation_pct,
                over_allocated: set.is_over_allocated(depot_id),
            }
        })
        .collect()
}
