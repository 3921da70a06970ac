use super::{AllocationInputLoader, RecalcOutcome};
use crate::config::AllocationConfigReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::allocation::RecalcFailure;
use crate::engine::allocation::AllocationEngine;
use crate::engine::error::{RecalcError, RecalcResult};
use crate::engine::snapshot::AllocationSnapshotStore;
use crate::repository::ActionLogRepository;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// AllocationService - 分配重算服务
// ==========================================
pub struct AllocationService {
    loader: Arc<dyn AllocationInputLoader>,
    engine: Arc<AllocationEngine>,
    snapshots: Arc<AllocationSnapshotStore>,
    config: Arc<dyn AllocationConfigReader>,
    action_log_repo: Option<Arc<ActionLogRepository>>,
    // 同一日期的重算串行执行（读取 → 发布），不同日期互不阻塞
    date_locks: Mutex<HashMap<NaiveDate, Arc<AsyncMutex<()>>>>,
}

impl AllocationService {
    /// 创建重算服务
    ///
    /// # 参数
    /// - loader: 登记数据读取
    /// - snapshots: 分配集快照仓库（与查询层共享）
    /// - config: 超时、成本模型与配置快照读取
    /// - action_log_repo: 审计日志（None 时不落审计）
    pub fn new(
        loader: Arc<dyn AllocationInputLoader>,
        snapshots: Arc<AllocationSnapshotStore>,
        config: Arc<dyn AllocationConfigReader>,
        action_log_repo: Option<Arc<ActionLogRepository>>,
    ) -> Self {
        Self {
            loader,
            engine: Arc::new(AllocationEngine::new()),
            snapshots,
            config,
            action_log_repo,
            date_locks: Mutex::new(HashMap::new()),
        }
    }

    fn date_lock(&self, date: NaiveDate) -> Arc<AsyncMutex<()>> {
        let mut locks = self.date_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(date).or_default().clone()
    }

    pub fn snapshots(&self) -> Arc<AllocationSnapshotStore> {
        self.snapshots.clone()
    }

    /// 重算单日分配
    ///
    /// # 返回
    /// - Ok(RecalcOutcome): 新快照已发布
    /// - Err(RecalcError): 失败已记录到快照仓库，之前的分配集不变
    #[instrument(skip(self), fields(date = %date))]
    pub async fn recalc_date(&self, date: NaiveDate, actor: &str) -> RecalcResult<RecalcOutcome> {
        let lock = self.date_lock(date);
        let _guard = lock.lock().await;
        debug!(date = %date, "获得日期重算锁");

        let started = Instant::now();
        match self.run(date, actor, started).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.record_failure(date, actor, &e);
                Err(e)
            }
        }
    }

    async fn run(&self, date: NaiveDate, actor: &str, started: Instant) -> RecalcResult<RecalcOutcome> {
        let timeout = self
            .config
            .get_registry_timeout()
            .await
            .map_err(|e| RecalcError::Config(e.to_string()))?;
        let cost_model = self
            .config
            .get_cost_model()
            .await
            .map_err(|e| RecalcError::Config(e.to_string()))?;

        // 1. 读取登记数据（带超时）
        let load = async {
            let inputs = self.loader.load_inputs(date).await?;
            let affinity = self.loader.load_affinity().await?;
            Ok::<_, RecalcError>((inputs, affinity))
        };
        let (inputs, affinity) = tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| RecalcError::RegistryTimeout {
                date,
                timeout_ms: timeout.as_millis() as u64,
            })??;

        // 2. 计算分配集（纯计算，同步执行）
        let set = self.engine.allocate(&inputs, &affinity)?;

        // 3. 原子发布
        let snapshot = self.snapshots.publish(set, cost_model);
        let set = &snapshot.set;

        let outcome = RecalcOutcome {
            date,
            version: snapshot.version,
            allocation_count: set.allocations.len(),
            allocated_parcels: set.total_allocated(),
            unallocated_parcels: set.total_unallocated(),
            over_allocated_depots: set.over_allocations.len(),
            skipped_overrides: set.skipped_overrides.len(),
            elapsed_ms: started.elapsed().as_millis() as i64,
        };

        info!(
            version = outcome.version,
            allocations = outcome.allocation_count,
            allocated_parcels = outcome.allocated_parcels,
            unallocated_parcels = outcome.unallocated_parcels,
            elapsed_ms = outcome.elapsed_ms,
            "分配重算完成"
        );

        // 4. 审计（失败不影响已发布的快照）
        let config_snapshot = match self.config.get_config_snapshot_json().await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
            Err(e) => {
                warn!(error = %e, "读取配置快照失败");
                serde_json::Value::Null
            }
        };
        self.audit(
            ActionLog::new(ActionType::Recalc, actor)
                .with_entity("AllocationSet", format!("{}#{}", date, outcome.version))
                .with_date(date)
                .with_values(
                    None,
                    Some(json!({
                        "summary": &outcome,
                        "config_snapshot": config_snapshot,
                    })),
                ),
        );

        Ok(outcome)
    }

    /// 并发重算多个日期（重复日期只算一次，结果按日期升序）
    pub async fn recalc_dates(
        self: &Arc<Self>,
        dates: &[NaiveDate],
        actor: &str,
    ) -> Vec<(NaiveDate, RecalcResult<RecalcOutcome>)> {
        let unique: BTreeSet<NaiveDate> = dates.iter().copied().collect();

        let handles: Vec<_> = unique
            .iter()
            .map(|&date| {
                let service = Arc::clone(self);
                let actor = actor.to_string();
                (
                    date,
                    tokio::spawn(async move { service.recalc_date(date, &actor).await }),
                )
            })
            .collect();

        let (dates, tasks): (Vec<NaiveDate>, Vec<_>) = handles.into_iter().unzip();
        let joined = futures::future::join_all(tasks).await;

        dates
            .into_iter()
            .zip(joined)
            .map(|(date, res)| {
                let res = res.unwrap_or_else(|e| Err(RecalcError::TaskJoin(e.to_string())));
                (date, res)
            })
            .collect()
    }

    fn record_failure(&self, date: NaiveDate, actor: &str, err: &RecalcError) {
        let retryable = err.is_retryable();
        error!(date = %date, retryable, error = %err, "分配重算失败，保留之前的分配集");

        self.snapshots.record_failure(RecalcFailure {
            date,
            failed_at: chrono::Utc::now().naive_utc(),
            message: err.to_string(),
            retryable,
        });
        self.audit(
            ActionLog::new(ActionType::RecalcFailed, actor)
                .with_entity("AllocationSet", date.to_string())
                .with_date(date)
                .with_detail(err.to_string()),
        );
    }

    fn audit(&self, log: ActionLog) {
        if let Some(repo) = &self.action_log_repo {
            if let Err(e) = repo.insert(&log) {
                warn!(error = %e, action_type = %log.action_type, "审计日志写入失败");
            }
        }
    }
}
