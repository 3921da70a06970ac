// ==========================================
// 集货分配系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 约束: 所有仓储共享同一个 SQLite 连接；查询层与重算服务共享同一个快照仓库
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{CapacityApi, OverrideApi, QueryApi};
use crate::config::{AllocationConfigReader, ConfigManager};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::recalc::{AllocationInputLoader, AllocationService, SqliteInputLoader};
use crate::engine::snapshot::AllocationSnapshotStore;
use crate::importer::{MasterDataImporter, VolumeImporter};
use crate::repository::{
    ActionLogRepository, CapacityRepository, DistanceRepository, OverrideRepository,
    VolumeRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 查询API（地图/下拉框/明细/驾驶舱）
    pub query_api: Arc<QueryApi>,

    /// 人工覆写API
    pub override_api: Arc<OverrideApi>,

    /// 仓库产能API
    pub capacity_api: Arc<CapacityApi>,

    /// 分配重算服务
    pub allocation_service: Arc<AllocationService>,

    /// 货量导入
    pub volume_importer: Arc<VolumeImporter>,

    /// 主数据导入
    pub master_data_importer: Arc<MasterDataImporter>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时自动创建并建表）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let capacity_repo = Arc::new(CapacityRepository::new(conn.clone()));
        let volume_repo = Arc::new(VolumeRepository::new(conn.clone()));
        let override_repo = Arc::new(OverrideRepository::new(conn.clone()));
        let distance_repo = Arc::new(DistanceRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let snapshots = Arc::new(AllocationSnapshotStore::new());
        let loader: Arc<dyn AllocationInputLoader> =
            Arc::new(SqliteInputLoader::new(conn.clone(), distance_repo.clone()));
        let config_reader: Arc<dyn AllocationConfigReader> = config_manager.clone();
        let allocation_service = Arc::new(AllocationService::new(
            loader,
            snapshots.clone(),
            config_reader,
            Some(action_log_repo.clone()),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let query_api = Arc::new(QueryApi::new(
            snapshots,
            capacity_repo.clone(),
            volume_repo.clone(),
        ));
        let override_api = Arc::new(OverrideApi::new(
            override_repo,
            capacity_repo.clone(),
            action_log_repo.clone(),
        ));
        let capacity_api = Arc::new(CapacityApi::new(capacity_repo.clone(), action_log_repo.clone()));

        let volume_importer = Arc::new(VolumeImporter::new(volume_repo.clone(), action_log_repo.clone()));
        let master_data_importer = Arc::new(MasterDataImporter::new(
            volume_repo,
            capacity_repo,
            distance_repo,
            action_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            query_api,
            override_api,
            capacity_api,
            allocation_service,
            volume_importer,
            master_data_importer,
            config_manager,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 FREIGHT_ROUTING_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("FREIGHT_ROUTING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./freight_routing.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("freight-routing");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("freight_routing.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_initializes_empty_database() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let db_path = temp.path().to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(state.capacity_api.list_depots().unwrap().is_empty());
    }
}
