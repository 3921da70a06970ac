// ==========================================
// 集货分配系统 - 分配集快照仓库
// ==========================================
// 红线: 读者只能看到完整的旧分配集或完整的新分配集，不存在中间态
// 实现: 每个日期一组不可变版本 (Arc<AllocationSnapshot>)，发布即整体替换
// 并发: 不同日期互不影响；读锁内只克隆 Arc
// ==========================================

use crate::config::cost_model::CostModel;
use crate::domain::allocation::{AllocationSet, AllocationSnapshot, RecalcFailure};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 每个日期保留的历史版本数
pub const MAX_VERSIONS_PER_DATE: usize = 16;

#[derive(Default)]
struct DateSlot {
    next_version: u64,
    versions: Vec<Arc<AllocationSnapshot>>,
    last_failure: Option<RecalcFailure>,
}

// ==========================================
// AllocationSnapshotStore - 快照仓库
// ==========================================
#[derive(Default)]
pub struct AllocationSnapshotStore {
    slots: RwLock<HashMap<NaiveDate, DateSlot>>,
}

impl AllocationSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    // 锁中毒时仍读取内部数据：快照均为不可变 Arc，不存在半写入状态
    fn read(&self) -> RwLockReadGuard<'_, HashMap<NaiveDate, DateSlot>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<NaiveDate, DateSlot>> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 发布新的分配集版本（原子替换该日期的最新版本）
    ///
    /// # 参数
    /// - set: 分配集
    /// - cost_model: 本次重算使用的成本模型
    ///
    /// # 返回
    /// 新版本快照；版本号从 1 开始递增
    pub fn publish(&self, set: AllocationSet, cost_model: CostModel) -> Arc<AllocationSnapshot> {
        let date = set.date;
        let mut slots = self.write();
        let slot = slots.entry(date).or_default();
        slot.next_version += 1;

        let snapshot = Arc::new(AllocationSnapshot {
            date,
            version: slot.next_version,
            computed_at: chrono::Utc::now().naive_utc(),
            cost_model,
            set,
        });
        slot.versions.push(snapshot.clone());
        if slot.versions.len() > MAX_VERSIONS_PER_DATE {
            let overflow = slot.versions.len() - MAX_VERSIONS_PER_DATE;
            slot.versions.drain(..overflow);
        }
        slot.last_failure = None;
        snapshot
    }

    /// 最新分配集
    pub fn latest(&self, date: NaiveDate) -> Option<Arc<AllocationSnapshot>> {
        self.read()
            .get(&date)
            .and_then(|slot| slot.versions.last().cloned())
    }

    /// 指定版本
    pub fn get_version(&self, date: NaiveDate, version: u64) -> Option<Arc<AllocationSnapshot>> {
        self.read().get(&date).and_then(|slot| {
            slot.versions
                .iter()
                .find(|s| s.version == version)
                .cloned()
        })
    }

    /// 保留中的版本号（升序）
    pub fn versions(&self, date: NaiveDate) -> Vec<u64> {
        self.read()
            .get(&date)
            .map(|slot| slot.versions.iter().map(|s| s.version).collect())
            .unwrap_or_default()
    }

    /// 已有分配集的日期（升序）
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .read()
            .iter()
            .filter(|(_, slot)| !slot.versions.is_empty())
            .map(|(date, _)| *date)
            .collect();
        dates.sort();
        dates
    }

    /// 记录重算失败（不影响已发布的分配集）
    pub fn record_failure(&self, failure: RecalcFailure) {
        let date = failure.date;
        let mut slots = self.write();
        slots.entry(date).or_default().last_failure = Some(failure);
    }

    /// 最近一次失败（成功发布后清空）
    pub fn last_failure(&self, date: NaiveDate) -> Option<RecalcFailure> {
        self.read().get(&date).and_then(|slot| slot.last_failure.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn empty_set(date: NaiveDate) -> AllocationSet {
        AllocationSet {
            date,
            eligible_depots: BTreeMap::new(),
            allocations: Vec::new(),
            unallocated: Vec::new(),
            over_allocations: Vec::new(),
            skipped_overrides: Vec::new(),
            depot_loads: Vec::new(),
        }
    }

    #[test]
    fn test_publish_increments_version_and_keeps_old_arc_alive() {
        let store = AllocationSnapshotStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();

        let v1 = store.publish(empty_set(date), CostModel::default());
        let reader_view = store.latest(date).unwrap();
        let v2 = store.publish(empty_set(date), CostModel::default());

        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(reader_view.version, 1);
        assert_eq!(store.latest(date).unwrap().version, 2);
        assert_eq!(store.versions(date), vec![1, 2]);
    }

    #[test]
    fn test_failure_does_not_replace_snapshot() {
        let store = AllocationSnapshotStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        store.publish(empty_set(date), CostModel::default());
        store.record_failure(RecalcFailure {
            date,
            failed_at: date.and_hms_opt(9, 0, 0).unwrap(),
            message: "timeout".to_string(),
            retryable: true,
        });

        assert_eq!(store.latest(date).unwrap().version, 1);
        assert!(store.last_failure(date).unwrap().retryable);

        store.publish(empty_set(date), CostModel::default());
        assert!(store.last_failure(date).is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let store = AllocationSnapshotStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        for _ in 0..(MAX_VERSIONS_PER_DATE + 3) {
            store.publish(empty_set(date), CostModel::default());
        }
        let versions = store.versions(date);
        assert_eq!(versions.len(), MAX_VERSIONS_PER_DATE);
        assert_eq!(versions.first(), Some(&4));
        assert!(store.get_version(date, 1).is_none());
    }
}
