// ==========================================
// 集货分配系统 - 集货点→仓库偏好表
// ==========================================
// 说明: 引擎把偏好表视为每个集货点的确定性候选顺序
// 来源: cp_depot_distance（按距离排名），或由调用方直接构造
// 红线: 偏好表按次传入引擎，不作为全局状态持有
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// AffinityEntry - 单条偏好
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityEntry {
    pub cp_id: String,
    pub depot_id: String,
    pub distance_miles: Option<f64>, // 直线距离（英里），配置型偏好可为空
    pub rank: u32,                   // 1 = 最优先
}

// ==========================================
// AffinityTable - 偏好表
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffinityTable {
    preferences: BTreeMap<String, Vec<AffinityEntry>>,
}

impl AffinityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由偏好条目构造（每个集货点内部按 rank、depot_id 排序）
    pub fn from_entries(entries: impl IntoIterator<Item = AffinityEntry>) -> Self {
        let mut preferences: BTreeMap<String, Vec<AffinityEntry>> = BTreeMap::new();
        for entry in entries {
            preferences.entry(entry.cp_id.clone()).or_default().push(entry);
        }
        for list in preferences.values_mut() {
            list.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.depot_id.cmp(&b.depot_id)));
        }
        Self { preferences }
    }

    /// 由显式顺序构造（如配置的默认仓库映射），不带距离
    pub fn from_orders(orders: BTreeMap<String, Vec<String>>) -> Self {
        Self::from_entries(orders.into_iter().flat_map(|(cp_id, depots)| {
            depots
                .into_iter()
                .enumerate()
                .map(move |(idx, depot_id)| AffinityEntry {
                    cp_id: cp_id.clone(),
                    depot_id,
                    distance_miles: None,
                    rank: idx as u32 + 1,
                })
        }))
    }

    /// 集货点的偏好仓库顺序（未配置返回空）
    pub fn preference_order(&self, cp_id: &str) -> Vec<&str> {
        self.preferences
            .get(cp_id)
            .map(|list| list.iter().map(|e| e.depot_id.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn entries_for(&self, cp_id: &str) -> &[AffinityEntry] {
        self.preferences.get(cp_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 集货点到仓库的距离（英里）
    pub fn distance(&self, cp_id: &str, depot_id: &str) -> Option<f64> {
        self.entries_for(cp_id)
            .iter()
            .find(|e| e.depot_id == depot_id)
            .and_then(|e| e.distance_miles)
    }

    pub fn cp_count(&self) -> usize {
        self.preferences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty()
    }
}
