// ==========================================
// 集货分配系统 - 集货点与日货量仓储 (Volume Registry)
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 日期范围内的集货点列表只来自 parcels > 0 的货量记录
// ==========================================

use crate::domain::collection_point::{CollectionPoint, VolumeRecord};
use crate::repository::error::{format_date, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

// ==========================================
// VolumeRepository - 货量仓储
// ==========================================
pub struct VolumeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VolumeRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_cp(row: &Row) -> SqliteResult<CollectionPoint> {
        Ok(CollectionPoint {
            cp_id: row.get(0)?,
            name: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            is_active: row.get::<_, i64>(4)? != 0,
        })
    }

    // ==========================================
    // 日货量
    // ==========================================

    /// 查询集货点某日货量（无记录返回 0）
    pub fn get_volume(&self, cp_id: &str, date: NaiveDate) -> RepositoryResult<u32> {
        let conn = self.get_conn()?;
        let parcels: Option<u32> = conn
            .query_row(
                "SELECT parcels FROM daily_volume WHERE cp_id = ?1 AND date = ?2",
                params![cp_id, format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parcels.unwrap_or(0))
    }

    /// 查询某日有货量的集货点（parcels > 0）
    pub fn list_cps_with_volume(&self, date: NaiveDate) -> RepositoryResult<BTreeSet<String>> {
        Ok(self.volumes_for_date(date)?.into_keys().collect())
    }

    /// 查询某日全部正货量（cp_id → parcels）
    pub fn volumes_for_date(&self, date: NaiveDate) -> RepositoryResult<BTreeMap<String, u32>> {
        let conn = self.get_conn()?;
        Self::volumes_on(&conn, date)
    }

    pub(crate) fn volumes_on(
        conn: &Connection,
        date: NaiveDate,
    ) -> RepositoryResult<BTreeMap<String, u32>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT cp_id, parcels
            FROM daily_volume
            WHERE date = ?1 AND parcels > 0
            ORDER BY cp_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<SqliteResult<Vec<(String, u32)>>>()?;
        Ok(rows.into_iter().collect())
    }

    /// 仅在 (cp_id, date) 不存在时写入货量
    ///
    /// # 返回
    /// - Ok(true): 新写入
    /// - Ok(false): 已存在，跳过
    pub fn insert_if_absent(
        &self,
        record: &VolumeRecord,
        imported_by: &str,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            INSERT OR IGNORE INTO daily_volume (cp_id, date, parcels, imported_by)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![record.cp_id, format_date(record.date), record.parcels, imported_by],
        )?;
        Ok(affected > 0)
    }

    // ==========================================
    // 集货点主数据
    // ==========================================

    pub fn find_cp(&self, cp_id: &str) -> RepositoryResult<Option<CollectionPoint>> {
        let conn = self.get_conn()?;
        let cp = conn
            .query_row(
                r#"
                SELECT cp_id, name, latitude, longitude, is_active
                FROM collection_point
                WHERE cp_id = ?1
                "#,
                params![cp_id],
                Self::map_cp,
            )
            .optional()?;
        Ok(cp)
    }

    pub fn list_cps(&self) -> RepositoryResult<Vec<CollectionPoint>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT cp_id, name, latitude, longitude, is_active
            FROM collection_point
            ORDER BY cp_id
            "#,
        )?;
        let cps = stmt
            .query_map([], Self::map_cp)?
            .collect::<SqliteResult<Vec<CollectionPoint>>>()?;
        Ok(cps)
    }

    /// 按代码批量查询集货点（未知代码忽略）
    pub fn list_cps_by_ids(
        &self,
        cp_ids: &BTreeSet<String>,
    ) -> RepositoryResult<BTreeMap<String, CollectionPoint>> {
        let mut result = BTreeMap::new();
        for cp_id in cp_ids {
            if let Some(cp) = self.find_cp(cp_id)? {
                result.insert(cp_id.clone(), cp);
            }
        }
        Ok(result)
    }

    pub fn upsert_cp(&self, cp: &CollectionPoint) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO collection_point (cp_id, name, latitude, longitude, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(cp_id) DO UPDATE SET
                name = excluded.name,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                is_active = excluded.is_active
            "#,
            params![cp.cp_id, cp.name, cp.latitude, cp.longitude, cp.is_active as i64],
        )?;
        Ok(())
    }

    /// 仅在不存在时插入集货点（主数据导入使用）
    pub fn insert_cp_if_absent(&self, cp: &CollectionPoint) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            INSERT OR IGNORE INTO collection_point (cp_id, name, latitude, longitude, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![cp.cp_id, cp.name, cp.latitude, cp.longitude, cp.is_active as i64],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> VolumeRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        VolumeRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn cp(id: &str) -> CollectionPoint {
        CollectionPoint {
            cp_id: id.to_string(),
            name: format!("CP {}", id),
            latitude: 52.0,
            longitude: -1.0,
            is_active: true,
        }
    }

    #[test]
    fn test_zero_volume_records_are_not_listed() {
        let repo = setup();
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        for id in ["CP001", "CP002", "CP003"] {
            repo.upsert_cp(&cp(id)).unwrap();
        }
        repo.insert_if_absent(&VolumeRecord { cp_id: "CP001".into(), date, parcels: 120 }, "test")
            .unwrap();
        repo.insert_if_absent(&VolumeRecord { cp_id: "CP002".into(), date, parcels: 0 }, "test")
            .unwrap();

        let listed = repo.list_cps_with_volume(date).unwrap();
        assert_eq!(listed.into_iter().collect::<Vec<_>>(), vec!["CP001".to_string()]);
        assert_eq!(repo.get_volume("CP003", date).unwrap(), 0);
        assert_eq!(repo.get_volume("CP001", date).unwrap(), 120);
    }

    #[test]
    fn test_insert_if_absent_keeps_first_record() {
        let repo = setup();
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        repo.upsert_cp(&cp("CP001")).unwrap();
        let first = VolumeRecord { cp_id: "CP001".into(), date, parcels: 10 };
        let second = VolumeRecord { parcels: 99, ..first.clone() };
        assert!(repo.insert_if_absent(&first, "test").unwrap());
        assert!(!repo.insert_if_absent(&second, "test").unwrap());
        assert_eq!(repo.get_volume("CP001", date).unwrap(), 10);
    }
}
