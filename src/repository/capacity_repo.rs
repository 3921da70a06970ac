// ==========================================
// 集货分配系统 - 仓库产能登记仓储 (Capacity Registry)
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 零产能/停用仓库在此处（SQL 层）被排除，下游不再二次过滤
// ==========================================

use crate::domain::depot::{CapacityOverride, Depot};
use crate::repository::error::{
    format_date, parse_date_column, parse_datetime_column, RepositoryError, RepositoryResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// CapacityRepository - 仓库与产能仓储
// ==========================================

/// 仓库产能仓储
/// 职责: 管理 depot / capacity_override 表
pub struct CapacityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CapacityRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_depot(row: &Row) -> SqliteResult<Depot> {
        Ok(Depot {
            depot_id: row.get(0)?,
            name: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            daily_capacity: row.get(4)?,
            is_active: row.get::<_, i64>(5)? != 0,
        })
    }

    fn map_capacity_override(row: &Row) -> SqliteResult<CapacityOverride> {
        Ok(CapacityOverride {
            depot_id: row.get(0)?,
            date: parse_date_column(1, &row.get::<_, String>(1)?)?,
            override_capacity: row.get(2)?,
            reason: row.get(3)?,
            created_by: row.get(4)?,
            created_at: parse_datetime_column(5, &row.get::<_, String>(5)?)?,
        })
    }

    // ==========================================
    // 仓库主数据
    // ==========================================

    /// 按仓库代码查询
    pub fn find_by_id(&self, depot_id: &str) -> RepositoryResult<Option<Depot>> {
        let conn = self.get_conn()?;
        let depot = conn
            .query_row(
                r#"
                SELECT depot_id, name, latitude, longitude, daily_capacity, is_active
                FROM depot
                WHERE depot_id = ?1
                "#,
                params![depot_id],
                Self::map_depot,
            )
            .optional()?;
        Ok(depot)
    }

    /// 查询全部仓库（按代码排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Depot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT depot_id, name, latitude, longitude, daily_capacity, is_active
            FROM depot
            ORDER BY depot_id
            "#,
        )?;
        let depots = stmt
            .query_map([], Self::map_depot)?
            .collect::<SqliteResult<Vec<Depot>>>()?;
        Ok(depots)
    }

    /// 插入或更新仓库
    pub fn upsert(&self, depot: &Depot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO depot (depot_id, name, latitude, longitude, daily_capacity, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(depot_id) DO UPDATE SET
                name = excluded.name,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                daily_capacity = excluded.daily_capacity,
                is_active = excluded.is_active
            "#,
            params![
                depot.depot_id,
                depot.name,
                depot.latitude,
                depot.longitude,
                depot.daily_capacity,
                depot.is_active as i64,
            ],
        )?;
        Ok(())
    }

    /// 仅在不存在时插入（主数据导入使用）
    ///
    /// # 返回
    /// - Ok(true): 新插入
    /// - Ok(false): 已存在，跳过
    pub fn insert_if_absent(&self, depot: &Depot) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            INSERT OR IGNORE INTO depot (depot_id, name, latitude, longitude, daily_capacity, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                depot.depot_id,
                depot.name,
                depot.latitude,
                depot.longitude,
                depot.daily_capacity,
                depot.is_active as i64,
            ],
        )?;
        Ok(affected > 0)
    }

    /// 更新日常产能
    ///
    /// # 返回
    /// - Ok(old_capacity): 更新前的产能
    /// - Err(NotFound): 仓库不存在
    pub fn update_capacity(&self, depot_id: &str, capacity: u32) -> RepositoryResult<u32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let old: Option<u32> = tx
            .query_row(
                "SELECT daily_capacity FROM depot WHERE depot_id = ?1",
                params![depot_id],
                |row| row.get(0),
            )
            .optional()?;
        let old = old.ok_or_else(|| RepositoryError::not_found("Depot", depot_id))?;

        tx.execute(
            "UPDATE depot SET daily_capacity = ?1 WHERE depot_id = ?2",
            params![capacity, depot_id],
        )?;
        tx.commit()?;
        Ok(old)
    }

    /// 启用/停用仓库
    pub fn set_active(&self, depot_id: &str, is_active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE depot SET is_active = ?1 WHERE depot_id = ?2",
            params![is_active as i64, depot_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Depot", depot_id));
        }
        Ok(())
    }

    // ==========================================
    // 产能查询
    // ==========================================

    /// 查询仓库日常产能
    ///
    /// # 返回
    /// - Ok(capacity)
    /// - Err(NotFound): 仓库代码未知
    pub fn get_capacity(&self, depot_id: &str) -> RepositoryResult<u32> {
        self.find_by_id(depot_id)?
            .map(|d| d.daily_capacity)
            .ok_or_else(|| RepositoryError::not_found("Depot", depot_id))
    }

    /// 查询仓库某日有效产能（产能覆写优先）
    pub fn effective_capacity(&self, depot_id: &str, date: NaiveDate) -> RepositoryResult<u32> {
        let conn = self.get_conn()?;
        let capacity: Option<u32> = conn
            .query_row(
                r#"
                SELECT COALESCE(co.override_capacity, d.daily_capacity)
                FROM depot d
                LEFT JOIN capacity_override co
                       ON co.depot_id = d.depot_id AND co.date = ?2
                WHERE d.depot_id = ?1
                "#,
                params![depot_id, format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        capacity.ok_or_else(|| RepositoryError::not_found("Depot", depot_id))
    }

    /// 查询某日可分配仓库及其有效产能
    ///
    /// 仅返回 is_active = 1 且有效产能 > 0 的仓库
    pub fn list_eligible_depots(&self, date: NaiveDate) -> RepositoryResult<BTreeMap<String, u32>> {
        let conn = self.get_conn()?;
        Self::eligible_depots_on(&conn, date)
    }

    /// 在调用方持有的连接/事务上读取可分配仓库
    pub(crate) fn eligible_depots_on(
        conn: &Connection,
        date: NaiveDate,
    ) -> RepositoryResult<BTreeMap<String, u32>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT d.depot_id, COALESCE(co.override_capacity, d.daily_capacity) AS capacity
            FROM depot d
            LEFT JOIN capacity_override co
                   ON co.depot_id = d.depot_id AND co.date = ?1
            WHERE d.is_active = 1
              AND COALESCE(co.override_capacity, d.daily_capacity) > 0
            ORDER BY d.depot_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<SqliteResult<Vec<(String, u32)>>>()?;
        Ok(rows.into_iter().collect())
    }

    // ==========================================
    // 日度产能覆写
    // ==========================================

    /// 新增产能覆写（同一 depot+date 重复时返回 UniqueConstraintViolation）
    pub fn insert_capacity_override(&self, co: &CapacityOverride) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO capacity_override (
                depot_id, date, override_capacity, reason, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                co.depot_id,
                format_date(co.date),
                co.override_capacity,
                co.reason,
                co.created_by,
                co.created_at.format(crate::db::DATETIME_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 删除产能覆写
    ///
    /// # 返回
    /// - Ok(Some(CapacityOverride)): 被删除的记录
    /// - Ok(None): 不存在
    pub fn delete_capacity_override(
        &self,
        depot_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<CapacityOverride>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                r#"
                SELECT depot_id, date, override_capacity, reason, created_by, created_at
                FROM capacity_override
                WHERE depot_id = ?1 AND date = ?2
                "#,
                params![depot_id, format_date(date)],
                Self::map_capacity_override,
            )
            .optional()?;
        if existing.is_some() {
            tx.execute(
                "DELETE FROM capacity_override WHERE depot_id = ?1 AND date = ?2",
                params![depot_id, format_date(date)],
            )?;
        }
        tx.commit()?;
        Ok(existing)
    }

    /// 查询某日全部产能覆写
    pub fn list_capacity_overrides(&self, date: NaiveDate) -> RepositoryResult<Vec<CapacityOverride>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT depot_id, date, override_capacity, reason, created_by, created_at
            FROM capacity_override
            WHERE date = ?1
            ORDER BY depot_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date)], Self::map_capacity_override)?
            .collect::<SqliteResult<Vec<CapacityOverride>>>()?;
        Ok(rows)
    }
}
