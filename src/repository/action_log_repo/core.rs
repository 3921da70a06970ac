use crate::domain::action_log::ActionLog;
use crate::repository::error::{format_date, RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

const INSERT_SQL: &str = r#"
    INSERT INTO action_log (
        action_id, action_type, action_ts, actor,
        entity_type, entity_id, target_date,
        old_value, new_value, detail
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 参数
    /// - `log`: 操作日志实体
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            INSERT_SQL,
            params![
                log.action_id,
                log.action_type,
                log.action_ts.format(crate::db::DATETIME_FORMAT).to_string(),
                log.actor,
                log.entity_type,
                log.entity_id,
                log.target_date.map(format_date),
                log.old_value.as_ref().map(|v| v.to_string()),
                log.new_value.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;
        Ok(log.action_id.clone())
    }

    /// 批量插入操作日志（单事务）
    pub fn batch_insert(&self, logs: &[ActionLog]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for log in logs {
            tx.execute(
                INSERT_SQL,
                params![
                    log.action_id,
                    log.action_type,
                    log.action_ts.format(crate::db::DATETIME_FORMAT).to_string(),
                    log.actor,
                    log.entity_type,
                    log.entity_id,
                    log.target_date.map(format_date),
                    log.old_value.as_ref().map(|v| v.to_string()),
                    log.new_value.as_ref().map(|v| v.to_string()),
                    log.detail,
                ],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }
}
