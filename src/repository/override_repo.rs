// ==========================================
// 集货分配系统 - 人工覆写仓储 (Override Store)
// ==========================================
// 红线: 同一 (cp_id, date) 仅一条覆写，重复写入返回 DuplicateOverride
// 红线: 覆写目标必须是当日可分配仓库（validate 返回 InvalidTarget）
// 并发: 每个 (cp_id, date) 独立的 version 计数器；基线版本过期返回 Conflict
//       禁止 last-writer-wins
//       删除后重新新增的版本号接续删除前的版本，不回到 1
// ==========================================

use crate::domain::manual_override::{ManualOverride, OverrideDraft};
use crate::repository::capacity_repo::CapacityRepository;
use crate::repository::error::{
    format_date, parse_date_column, parse_datetime_column, RepositoryError, RepositoryResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// OverrideRepository - 覆写仓储
// ==========================================
pub struct OverrideRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OverrideRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> SqliteResult<ManualOverride> {
        Ok(ManualOverride {
            cp_id: row.get(0)?,
            date: parse_date_column(1, &row.get::<_, String>(1)?)?,
            depot_id: row.get(2)?,
            volume: row.get(3)?,
            version: row.get(4)?,
            created_by: row.get(5)?,
            updated_at: parse_datetime_column(6, &row.get::<_, String>(6)?)?,
        })
    }

    fn find_in_tx(
        tx: &Transaction,
        cp_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<ManualOverride>> {
        let found = tx
            .query_row(
                r#"
                SELECT cp_id, date, depot_id, volume, version, created_by, updated_at
                FROM manual_override
                WHERE cp_id = ?1 AND date = ?2
                "#,
                params![cp_id, format_date(date)],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    /// 该 (cp_id, date) 下一次新增应使用的版本号
    fn next_version_in_tx(tx: &Transaction, cp_id: &str, date: NaiveDate) -> RepositoryResult<i64> {
        let last: Option<i64> = tx
            .query_row(
                "SELECT last_version FROM manual_override_version WHERE cp_id = ?1 AND date = ?2",
                params![cp_id, format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(last.unwrap_or(0) + 1)
    }

    fn now_str() -> String {
        chrono::Utc::now()
            .naive_utc()
            .format(crate::db::DATETIME_FORMAT)
            .to_string()
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询某日全部覆写（按 cp_id 升序，即应用顺序）
    pub fn get_overrides(&self, date: NaiveDate) -> RepositoryResult<Vec<ManualOverride>> {
        let conn = self.get_conn()?;
        Self::overrides_on(&conn, date)
    }

    pub(crate) fn overrides_on(
        conn: &Connection,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ManualOverride>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT cp_id, date, depot_id, volume, version, created_by, updated_at
            FROM manual_override
            WHERE date = ?1
            ORDER BY cp_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date)], Self::map_row)?
            .collect::<SqliteResult<Vec<ManualOverride>>>()?;
        Ok(rows)
    }

    pub fn find(&self, cp_id: &str, date: NaiveDate) -> RepositoryResult<Option<ManualOverride>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let found = Self::find_in_tx(&tx, cp_id, date)?;
        tx.commit()?;
        Ok(found)
    }

    // ==========================================
    // 校验
    // ==========================================

    /// 校验覆写目标
    ///
    /// # 返回
    /// - Ok(()): 目标仓库当日启用且有效产能 > 0
    /// - Err(InvalidTarget): 目标停用或产能为 0
    /// - Err(NotFound): 仓库代码未知
    pub fn validate(
        &self,
        draft: &OverrideDraft,
        capacity_repo: &CapacityRepository,
    ) -> RepositoryResult<()> {
        let depot = capacity_repo
            .find_by_id(&draft.depot_id)?
            .ok_or_else(|| RepositoryError::not_found("Depot", draft.depot_id.clone()))?;

        if !depot.is_active {
            return Err(RepositoryError::InvalidTarget {
                depot_id: draft.depot_id.clone(),
                reason: "仓库已停用".to_string(),
            });
        }

        let capacity = capacity_repo.effective_capacity(&draft.depot_id, draft.date)?;
        if capacity == 0 {
            return Err(RepositoryError::InvalidTarget {
                depot_id: draft.depot_id.clone(),
                reason: format!("仓库 {} 当日产能为 0", draft.date),
            });
        }
        Ok(())
    }

    // ==========================================
    // 写入（均在事务内完成版本检查）
    // ==========================================

    /// 新增覆写（version = 1）
    pub fn create(&self, draft: &OverrideDraft, actor: &str) -> RepositoryResult<ManualOverride> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if Self::find_in_tx(&tx, &draft.cp_id, draft.date)?.is_some() {
            return Err(RepositoryError::DuplicateOverride {
                cp_id: draft.cp_id.clone(),
                date: draft.date,
            });
        }

        let version = Self::next_version_in_tx(&tx, &draft.cp_id, draft.date)?;
        tx.execute(
            r#"
            INSERT INTO manual_override (cp_id, date, depot_id, volume, version, created_by, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                draft.cp_id,
                format_date(draft.date),
                draft.depot_id,
                draft.volume,
                version,
                actor,
                Self::now_str(),
            ],
        )?;

        let created = Self::find_in_tx(&tx, &draft.cp_id, draft.date)?
            .ok_or_else(|| RepositoryError::InternalError("覆写写入后读取失败".to_string()))?;
        tx.commit()?;
        Ok(created)
    }

    /// 更新覆写目标/限定量
    ///
    /// # 参数
    /// - `base_version`: 调用方读取时的版本号
    ///
    /// # 返回
    /// - Ok((before, after))
    /// - Err(Conflict): 基线版本已过期
    /// - Err(NotFound): 覆写不存在
    pub fn update(
        &self,
        draft: &OverrideDraft,
        base_version: i64,
    ) -> RepositoryResult<(ManualOverride, ManualOverride)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let before = Self::find_in_tx(&tx, &draft.cp_id, draft.date)?.ok_or_else(|| {
            RepositoryError::not_found(
                "ManualOverride",
                format!("{}@{}", draft.cp_id, format_date(draft.date)),
            )
        })?;
        if before.version != base_version {
            return Err(RepositoryError::Conflict {
                cp_id: draft.cp_id.clone(),
                date: draft.date,
                expected: base_version,
                actual: before.version,
            });
        }

        tx.execute(
            r#"
            UPDATE manual_override
            SET depot_id = ?1, volume = ?2, version = version + 1, updated_at = ?3
            WHERE cp_id = ?4 AND date = ?5 AND version = ?6
            "#,
            params![
                draft.depot_id,
                draft.volume,
                Self::now_str(),
                draft.cp_id,
                format_date(draft.date),
                base_version,
            ],
        )?;

        let after = Self::find_in_tx(&tx, &draft.cp_id, draft.date)?
            .ok_or_else(|| RepositoryError::InternalError("覆写更新后读取失败".to_string()))?;
        tx.commit()?;
        Ok((before, after))
    }

    /// 删除覆写
    ///
    /// # 返回
    /// - Ok(ManualOverride): 被删除的记录
    /// - Err(Conflict): 基线版本已过期
    /// - Err(NotFound): 覆写不存在
    pub fn delete(
        &self,
        cp_id: &str,
        date: NaiveDate,
        base_version: i64,
    ) -> RepositoryResult<ManualOverride> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let existing = Self::find_in_tx(&tx, cp_id, date)?.ok_or_else(|| {
            RepositoryError::not_found("ManualOverride", format!("{}@{}", cp_id, format_date(date)))
        })?;
        if existing.version != base_version {
            return Err(RepositoryError::Conflict {
                cp_id: cp_id.to_string(),
                date,
                expected: base_version,
                actual: existing.version,
            });
        }

        tx.execute(
            "DELETE FROM manual_override WHERE cp_id = ?1 AND date = ?2 AND version = ?3",
            params![cp_id, format_date(date), base_version],
        )?;
        tx.execute(
            r#"
            INSERT INTO manual_override_version (cp_id, date, last_version)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (cp_id, date) DO UPDATE SET last_version = excluded.last_version
            "#,
            params![cp_id, format_date(date), existing.version],
        )?;
        tx.commit()?;
        Ok(existing)
    }
}
