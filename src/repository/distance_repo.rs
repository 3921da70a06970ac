// ==========================================
// 集货分配系统 - 集货点/仓库距离仓储
// ==========================================
// 职责: 持久化距离排名（cp_depot_distance），加载为偏好表
// 红线: 排名计算在 engine::affinity，本仓储只做整表替换与读取
// ==========================================

use crate::domain::affinity::{AffinityEntry, AffinityTable};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct DistanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DistanceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 整表重建距离排名（单事务）
    ///
    /// # 返回
    /// - Ok(n): 写入行数
    pub fn rebuild(&self, entries: &[AffinityEntry]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM cp_depot_distance", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO cp_depot_distance (cp_id, depot_id, distance_miles, rank)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for e in entries {
                stmt.execute(params![
                    e.cp_id,
                    e.depot_id,
                    e.distance_miles.unwrap_or(0.0),
                    e.rank
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// 加载全部距离排名为偏好表
    pub fn load_affinity_table(&self) -> RepositoryResult<AffinityTable> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT cp_id, depot_id, distance_miles, rank
            FROM cp_depot_distance
            ORDER BY cp_id, rank, depot_id
            "#,
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(AffinityEntry {
                    cp_id: row.get(0)?,
                    depot_id: row.get(1)?,
                    distance_miles: Some(row.get(2)?),
                    rank: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<AffinityEntry>>>()?;
        Ok(AffinityTable::from_entries(entries))
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM cp_depot_distance", [], |row| row.get(0))?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> DistanceRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO depot (depot_id, name, latitude, longitude, daily_capacity)
            VALUES ('D001', 'D001', 51.5, -0.1, 100), ('D002', 'D002', 51.7, 0.4, 100);
            INSERT INTO collection_point (cp_id, name, latitude, longitude)
            VALUES ('CP001', 'CP001', 51.5, -0.2), ('CP002', 'CP002', 51.8, 0.5);
            "#,
        )
        .unwrap();
        DistanceRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn entry(cp: &str, depot: &str, miles: f64, rank: u32) -> AffinityEntry {
        AffinityEntry {
            cp_id: cp.to_string(),
            depot_id: depot.to_string(),
            distance_miles: Some(miles),
            rank,
        }
    }

    #[test]
    fn test_rebuild_replaces_previous_rows() {
        let repo = setup();
        repo.rebuild(&[entry("CP001", "D001", 5.0, 1), entry("CP001", "D002", 9.0, 2)])
            .unwrap();
        repo.rebuild(&[entry("CP002", "D002", 3.0, 1)]).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let table = repo.load_affinity_table().unwrap();
        assert!(table.preference_order("CP001").is_empty());
        assert_eq!(table.preference_order("CP002"), vec!["D002"]);
        assert_eq!(table.distance("CP002", "D002"), Some(3.0));
    }

    #[test]
    fn test_rebuild_with_unknown_cp_rolls_back() {
        let repo = setup();
        repo.rebuild(&[entry("CP001", "D001", 5.0, 1)]).unwrap();

        assert!(repo.rebuild(&[entry("CP404", "D001", 1.0, 1)]).is_err());
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.load_affinity_table().unwrap().preference_order("CP001"), vec!["D001"]);
    }
}
