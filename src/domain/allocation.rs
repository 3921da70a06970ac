// ==========================================
// 集货分配系统 - 分配结果领域模型
// ==========================================
// 红线: 分配集一经发布不可变，输入变化时整体重算替换
// 红线: 任何偏离完整分配的情况都必须以数据形式体现
//       (UnallocatedVolume / OverAllocation / SkippedOverride)，不得只写日志
// ==========================================

use crate::config::cost_model::CostModel;
use crate::domain::types::{AllocationSource, OverrideSkipReason, UnallocatedReason};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// Allocation - 单条分配记录
// ==========================================
// 每个 (cp_id, depot_id, source) 至多一条，parcels > 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub cp_id: String,
    pub depot_id: String,
    pub date: NaiveDate,
    pub parcels: u32,
    pub source: AllocationSource,
    pub distance_miles: Option<f64>, // 来自亲和表，成本计算使用
}

// ==========================================
// UnallocatedVolume - 未能路由的货量
// ==========================================
// 非致命，可报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnallocatedVolume {
    pub cp_id: String,
    pub date: NaiveDate,
    pub parcels: u32,
    pub reason: UnallocatedReason,
}

// ==========================================
// OverAllocation - 覆写导致的超产能
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverAllocation {
    pub depot_id: String,
    pub capacity: u32,
    pub allocated: u64,
    pub excess: u64,
}

// ==========================================
// SkippedOverride - 运行时目标失效的覆写
// ==========================================
// 对应集货点回落到自动分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOverride {
    pub cp_id: String,
    pub depot_id: String,
    pub reason: OverrideSkipReason,
}

// ==========================================
// DepotLoad - 仓库负载汇总
// ==========================================
// 仅包含当日至少有一条分配的仓库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotLoad {
    pub depot_id: String,
    pub capacity: u32,
    pub allocated_parcels: u64,
    pub utilisation_pct: f64,
    pub over_allocated: bool,
}

// ==========================================
// AllocationSet - 某日完整分配集
// ==========================================
// 相同输入两次计算结果必须相等（含序列化字节）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSet {
    pub date: NaiveDate,
    /// 当日可用仓库及其有效产能
    pub eligible_depots: BTreeMap<String, u32>,
    pub allocations: Vec<Allocation>,
    pub unallocated: Vec<UnallocatedVolume>,
    pub over_allocations: Vec<OverAllocation>,
    pub skipped_overrides: Vec<SkippedOverride>,
    pub depot_loads: Vec<DepotLoad>,
}

impl AllocationSet {
    /// 指定集货点的全部分配
    pub fn allocations_for_cp<'a>(&'a self, cp_id: &'a str) -> impl Iterator<Item = &'a Allocation> + 'a {
        self.allocations.iter().filter(move |a| a.cp_id == cp_id)
    }

    /// 指定仓库的全部分配
    pub fn allocations_for_depot<'a>(
        &'a self,
        depot_id: &'a str,
    ) -> impl Iterator<Item = &'a Allocation> + 'a {
        self.allocations.iter().filter(move |a| a.depot_id == depot_id)
    }

    /// 分配给仓库的总件数
    pub fn parcels_to_depot(&self, depot_id: &str) -> u64 {
        self.allocations_for_depot(depot_id)
            .map(|a| a.parcels as u64)
            .sum()
    }

    /// 已分配总件数
    pub fn total_allocated(&self) -> u64 {
        self.allocations.iter().map(|a| a.parcels as u64).sum()
    }

    /// 未分配总件数
    pub fn total_unallocated(&self) -> u64 {
        self.unallocated.iter().map(|u| u.parcels as u64).sum()
    }

    /// 当日有分配的集货点
    pub fn routed_cp_ids(&self) -> BTreeSet<&str> {
        self.allocations.iter().map(|a| a.cp_id.as_str()).collect()
    }

    /// 当日有分配的仓库
    pub fn active_depot_ids(&self) -> BTreeSet<&str> {
        self.allocations.iter().map(|a| a.depot_id.as_str()).collect()
    }

    pub fn is_over_allocated(&self, depot_id: &str) -> bool {
        self.over_allocations.iter().any(|o| o.depot_id == depot_id)
    }

    pub fn depot_load(&self, depot_id: &str) -> Option<&DepotLoad> {
        self.depot_loads.iter().find(|l| l.depot_id == depot_id)
    }
}

// ==========================================
// AllocationSnapshot - 分配集版本
// ==========================================
// computed_at 不参与分配集本身的相等比较
// cost_model 为重算时读取的成本模型，成本视图只按它计算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    pub date: NaiveDate,
    pub version: u64,
    pub computed_at: NaiveDateTime,
    pub cost_model: CostModel,
    pub set: AllocationSet,
}

// ==========================================
// RecalcFailure - 重算失败记录
// ==========================================
// 用途: 让运营/监控看到失败，之前的分配集保持可见
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalcFailure {
    pub date: NaiveDate,
    pub failed_at: NaiveDateTime,
    pub message: String,
    pub retryable: bool,
}
