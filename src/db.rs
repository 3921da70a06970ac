// ==========================================
// 集货分配系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表语句，测试与生产使用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// 日期列统一格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 时间戳列统一格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 创建全部业务表（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS depot (
            depot_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            daily_capacity INTEGER NOT NULL DEFAULT 0 CHECK (daily_capacity >= 0),
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS collection_point (
            cp_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS daily_volume (
            cp_id TEXT NOT NULL REFERENCES collection_point(cp_id),
            date TEXT NOT NULL,
            parcels INTEGER NOT NULL CHECK (parcels >= 0),
            imported_by TEXT,
            imported_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (cp_id, date)
        );
        CREATE INDEX IF NOT EXISTS idx_daily_volume_date ON daily_volume(date);

        CREATE TABLE IF NOT EXISTS manual_override (
            cp_id TEXT NOT NULL REFERENCES collection_point(cp_id),
            date TEXT NOT NULL,
            depot_id TEXT NOT NULL REFERENCES depot(depot_id),
            volume INTEGER CHECK (volume IS NULL OR volume >= 0),
            version INTEGER NOT NULL DEFAULT 1,
            created_by TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (cp_id, date)
        );
        CREATE INDEX IF NOT EXISTS idx_manual_override_date ON manual_override(date);

        -- 覆写删除后保留最后版本号，重新新增时从其后继续编号
        CREATE TABLE IF NOT EXISTS manual_override_version (
            cp_id TEXT NOT NULL,
            date TEXT NOT NULL,
            last_version INTEGER NOT NULL,
            PRIMARY KEY (cp_id, date)
        );

        CREATE TABLE IF NOT EXISTS capacity_override (
            depot_id TEXT NOT NULL REFERENCES depot(depot_id),
            date TEXT NOT NULL,
            override_capacity INTEGER NOT NULL CHECK (override_capacity >= 0),
            reason TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (depot_id, date)
        );

        CREATE TABLE IF NOT EXISTS cp_depot_distance (
            cp_id TEXT NOT NULL REFERENCES collection_point(cp_id),
            depot_id TEXT NOT NULL REFERENCES depot(depot_id),
            distance_miles REAL NOT NULL,
            rank INTEGER NOT NULL,
            PRIMARY KEY (cp_id, depot_id)
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            entity_type TEXT,
            entity_id TEXT,
            target_date TEXT,
            old_value TEXT,
            new_value TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent_on_empty_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
