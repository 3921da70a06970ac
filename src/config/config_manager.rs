// ==========================================
// 集货分配系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// 约束: 配置值格式错误时回落默认值并记录 warn
// ==========================================

use crate::config::allocation_config_trait::AllocationConfigReader;
use crate::config::cost_model::{
    CostModel, DEFAULT_PARCELS_PER_TRAILER, DEFAULT_PER_PARCEL_RATE, DEFAULT_ROUTE_BASE,
    DEFAULT_ROUTE_MINIMUM, DEFAULT_ROUTE_PER_MILE,
};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 登记数据读取超时默认值（毫秒）
pub const DEFAULT_REGISTRY_TIMEOUT_MS: u64 = 5_000;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取并解析数值配置；格式错误时回落默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + ToString + Copy,
    {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        Ok(raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
            default
        }))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 在重算时记录配置快照，写入审计日志
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 成本模型 =====

    /// 读取成本模型
    ///
    /// # 说明
    /// cost_model 取值 PER_ROUTE / PER_PARCEL，未知取值回落 PER_ROUTE
    pub fn load_cost_model(&self) -> ConfigResult<CostModel> {
        let kind = self.get_config_or_default(config_keys::COST_MODEL, "PER_ROUTE")?;
        match kind.trim().to_uppercase().as_str() {
            "PER_PARCEL" => Ok(CostModel::PerParcel {
                rate: self.get_parsed_or_default(config_keys::COST_PER_PARCEL_RATE, DEFAULT_PER_PARCEL_RATE)?,
            }),
            other => {
                if other != "PER_ROUTE" {
                    tracing::warn!(
                        config_key = config_keys::COST_MODEL,
                        raw_value = %kind,
                        "未知成本模型，使用 PER_ROUTE"
                    );
                }
                Ok(CostModel::PerRoute {
                    base: self.get_parsed_or_default(config_keys::COST_ROUTE_BASE, DEFAULT_ROUTE_BASE)?,
                    per_mile: self
                        .get_parsed_or_default(config_keys::COST_ROUTE_PER_MILE, DEFAULT_ROUTE_PER_MILE)?,
                    minimum: self
                        .get_parsed_or_default(config_keys::COST_ROUTE_MINIMUM, DEFAULT_ROUTE_MINIMUM)?,
                    parcels_per_trailer: self
                        .get_parsed_or_default(
                            config_keys::COST_PARCELS_PER_TRAILER,
                            DEFAULT_PARCELS_PER_TRAILER,
                        )?
                        .max(1),
                })
            }
        }
    }

    /// 读取登记数据读取超时
    pub fn load_registry_timeout(&self) -> ConfigResult<Duration> {
        let ms = self.get_parsed_or_default(config_keys::REGISTRY_TIMEOUT_MS, DEFAULT_REGISTRY_TIMEOUT_MS)?;
        Ok(Duration::from_millis(ms))
    }
}

// ==========================================
// AllocationConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AllocationConfigReader for ConfigManager {
    async fn get_cost_model(&self) -> ConfigResult<CostModel> {
        self.load_cost_model()
    }

    async fn get_registry_timeout(&self) -> ConfigResult<Duration> {
        self.load_registry_timeout()
    }

    async fn get_config_snapshot_json(&self) -> ConfigResult<String> {
        self.get_config_snapshot()
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 成本模型
    pub const COST_MODEL: &str = "cost_model"; // PER_ROUTE | PER_PARCEL
    pub const COST_ROUTE_BASE: &str = "cost_route_base";
    pub const COST_ROUTE_PER_MILE: &str = "cost_route_per_mile";
    pub const COST_ROUTE_MINIMUM: &str = "cost_route_minimum";
    pub const COST_PARCELS_PER_TRAILER: &str = "cost_parcels_per_trailer";
    pub const COST_PER_PARCEL_RATE: &str = "cost_per_parcel_rate";

    // 重算
    pub const REGISTRY_TIMEOUT_MS: &str = "registry_timeout_ms";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = setup();
        assert_eq!(config.load_cost_model().unwrap(), CostModel::default());
        assert_eq!(
            config.load_registry_timeout().unwrap(),
            Duration::from_millis(DEFAULT_REGISTRY_TIMEOUT_MS)
        );
    }

    #[test]
    fn test_per_parcel_model() {
        let config = setup();
        config.set_config_value(config_keys::COST_MODEL, "per_parcel").unwrap();
        config.set_config_value(config_keys::COST_PER_PARCEL_RATE, "0.75").unwrap();
        assert_eq!(config.load_cost_model().unwrap(), CostModel::PerParcel { rate: 0.75 });
    }

    #[test]
    fn test_malformed_value_falls_back_to_default() {
        let config = setup();
        config.set_config_value(config_keys::COST_ROUTE_BASE, "abc").unwrap();
        config.set_config_value(config_keys::REGISTRY_TIMEOUT_MS, "250").unwrap();
        match config.load_cost_model().unwrap() {
            CostModel::PerRoute { base, .. } => assert_eq!(base, DEFAULT_ROUTE_BASE),
            other => panic!("unexpected model: {other:?}"),
        }
        assert_eq!(config.load_registry_timeout().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_snapshot_contains_written_keys() {
        let config = setup();
        config.set_config_value(config_keys::COST_MODEL, "PER_ROUTE").unwrap();
        let snapshot: serde_json::Value =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot["cost_model"], "PER_ROUTE");
    }
}
