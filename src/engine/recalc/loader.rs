use crate::domain::affinity::AffinityTable;
use crate::engine::allocation::AllocationInputs;
use crate::engine::error::{RecalcError, RecalcResult};
use crate::repository::error::RepositoryError;
use crate::repository::{
    CapacityRepository, DistanceRepository, OverrideRepository, VolumeRepository,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

// ==========================================
// AllocationInputLoader - 登记数据读取接口
// ==========================================
// 实现者: SqliteInputLoader；测试可注入慢速/失败实现
#[async_trait]
pub trait AllocationInputLoader: Send + Sync {
    /// 读取某日的可用仓库、货量与覆写
    async fn load_inputs(&self, date: NaiveDate) -> RecalcResult<AllocationInputs>;

    /// 读取偏好表
    async fn load_affinity(&self) -> RecalcResult<AffinityTable>;
}

// ==========================================
// SqliteInputLoader - 基于仓储的读取实现
// ==========================================
// rusqlite 为阻塞调用，统一放入 spawn_blocking
// 红线: 可用仓库/货量/覆写在同一读事务内读取，不会读到半次写入
pub struct SqliteInputLoader {
    conn: Arc<Mutex<Connection>>,
    distance_repo: Arc<DistanceRepository>,
}

impl SqliteInputLoader {
    pub fn new(conn: Arc<Mutex<Connection>>, distance_repo: Arc<DistanceRepository>) -> Self {
        Self {
            conn,
            distance_repo,
        }
    }
}

#[async_trait]
impl AllocationInputLoader for SqliteInputLoader {
    async fn load_inputs(&self, date: NaiveDate) -> RecalcResult<AllocationInputs> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> RecalcResult<AllocationInputs> {
            let mut conn = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Deferred)
                .map_err(RepositoryError::from)?;

            let inputs = AllocationInputs {
                date,
                eligible_depots: CapacityRepository::eligible_depots_on(&tx, date)?,
                volumes: VolumeRepository::volumes_on(&tx, date)?,
                overrides: OverrideRepository::overrides_on(&tx, date)?,
            };
            tx.commit().map_err(RepositoryError::from)?;
            Ok(inputs)
        })
        .await
        .map_err(|e| RecalcError::TaskJoin(e.to_string()))?
    }

    async fn load_affinity(&self) -> RecalcResult<AffinityTable> {
        let distance_repo = self.distance_repo.clone();
        tokio::task::spawn_blocking(move || distance_repo.load_affinity_table())
            .await
            .map_err(|e| RecalcError::TaskJoin(e.to_string()))?
            .map_err(RecalcError::from)
    }
}
