use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::repository::error::{format_date, parse_datetime_column, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT action_id, action_type, action_ts, actor,
           entity_type, entity_id, target_date,
           old_value, new_value, detail
    FROM action_log
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{SELECT_COLUMNS} WHERE action_id = ?");
        let log = conn
            .query_row(&sql, params![action_id], |row| self.map_row(row))
            .optional()?;
        Ok(log)
    }

    /// 查询最近 N 条日志（按时间倒序）
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{SELECT_COLUMNS} ORDER BY action_ts DESC, rowid DESC LIMIT ?");
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询影响某日的全部日志
    pub fn find_by_target_date(&self, date: NaiveDate) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{SELECT_COLUMNS} WHERE target_date = ? ORDER BY action_ts DESC, rowid DESC");
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![format_date(date)], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 按操作类型查询
    pub fn find_by_action_type(
        &self,
        action_type: &str,
        limit: i32,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE action_type = ? ORDER BY action_ts DESC, rowid DESC LIMIT ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![action_type, limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 统计指定操作人的操作总数
    pub fn count_by_actor(&self, actor: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE actor = ?",
            params![actor],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 将数据库行映射为 ActionLog 实体
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let action_ts_str: String = row.get(2)?;
        let target_date_str: Option<String> = row.get(6)?;
        let old_value_str: Option<String> = row.get(7)?;
        let new_value_str: Option<String> = row.get(8)?;

        // JSON/日期解析失败时置空，不阻断审计查询
        let target_date = target_date_str
            .and_then(|s| NaiveDate::parse_from_str(&s, crate::db::DATE_FORMAT).ok());
        let old_value = old_value_str.and_then(|s| serde_json::from_str(&s).ok());
        let new_value = new_value_str.and_then(|s| serde_json::from_str(&s).ok());

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: row.get(1)?,
            action_ts: parse_datetime_column(2, &action_ts_str)?,
            actor: row.get(3)?,
            entity_type: row.get(4)?,
            entity_id: row.get(5)?,
            target_date,
            old_value,
            new_value,
            detail: row.get(9)?,
        })
    }
}
