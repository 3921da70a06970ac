// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、主数据/货量种子、服务组装
// ==========================================
#![allow(dead_code)]

use chrono::NaiveDate;
use freight_routing::api::{OverrideApi, QueryApi};
use freight_routing::config::{AllocationConfigReader, ConfigManager};
use freight_routing::db::{init_schema, open_sqlite_connection};
use freight_routing::domain::{CollectionPoint, Depot, VolumeRecord};
use freight_routing::engine::recalc::{AllocationInputLoader, AllocationService, SqliteInputLoader};
use freight_routing::engine::{rank_depots_by_distance, AllocationSnapshotStore};
use freight_routing::repository::{
    ActionLogRepository, CapacityRepository, DistanceRepository, OverrideRepository,
    VolumeRepository,
};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const TEST_ACTOR: &str = "test_user";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径非 UTF-8")?.to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接（已应用 PRAGMA）
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(open_sqlite_connection(db_path)?)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn depot(id: &str, name: &str, lat: f64, lon: f64, capacity: u32) -> Depot {
    Depot {
        depot_id: id.to_string(),
        name: name.to_string(),
        latitude: lat,
        longitude: lon,
        daily_capacity: capacity,
        is_active: true,
    }
}

pub fn cp(id: &str, name: &str, lat: f64, lon: f64) -> CollectionPoint {
    CollectionPoint {
        cp_id: id.to_string(),
        name: name.to_string(),
        latitude: lat,
        longitude: lon,
        is_active: true,
    }
}

// ==========================================
// TestContext - 共享连接上的完整服务组装
// ==========================================
pub struct TestContext {
    pub _temp_file: NamedTempFile,
    pub conn: Arc<Mutex<Connection>>,
    pub capacity_repo: Arc<CapacityRepository>,
    pub volume_repo: Arc<VolumeRepository>,
    pub override_repo: Arc<OverrideRepository>,
    pub distance_repo: Arc<DistanceRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub config_manager: Arc<ConfigManager>,
    pub snapshots: Arc<AllocationSnapshotStore>,
    pub service: Arc<AllocationService>,
    pub query_api: QueryApi,
    pub override_api: OverrideApi,
}

impl TestContext {
    pub fn new() -> Self {
        freight_routing::logging::init_test();
        let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
        let conn = Arc::new(Mutex::new(
            open_test_connection(&db_path).expect("打开数据库失败"),
        ));

        let capacity_repo = Arc::new(CapacityRepository::new(conn.clone()));
        let volume_repo = Arc::new(VolumeRepository::new(conn.clone()));
        let override_repo = Arc::new(OverrideRepository::new(conn.clone()));
        let distance_repo = Arc::new(DistanceRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager =
            Arc::new(ConfigManager::from_connection(conn.clone()).expect("创建配置管理器失败"));
        let snapshots = Arc::new(AllocationSnapshotStore::new());

        let loader: Arc<dyn AllocationInputLoader> =
            Arc::new(SqliteInputLoader::new(conn.clone(), distance_repo.clone()));
        Self::assemble(
            temp_file,
            conn,
            capacity_repo,
            volume_repo,
            override_repo,
            distance_repo,
            action_log_repo,
            config_manager,
            snapshots,
            loader,
        )
    }

    /// 使用自定义登记读取实现（用于慢读取/超时测试）
    pub fn with_loader(loader: Arc<dyn AllocationInputLoader>) -> Self {
        let base = Self::new();
        let TestContext {
            _temp_file,
            conn,
            capacity_repo,
            volume_repo,
            override_repo,
            distance_repo,
            action_log_repo,
            config_manager,
            snapshots,
            ..
        } = base;
        Self::assemble(
            _temp_file,
            conn,
            capacity_repo,
            volume_repo,
            override_repo,
            distance_repo,
            action_log_repo,
            config_manager,
            snapshots,
            loader,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        temp_file: NamedTempFile,
        conn: Arc<Mutex<Connection>>,
        capacity_repo: Arc<CapacityRepository>,
        volume_repo: Arc<VolumeRepository>,
        override_repo: Arc<OverrideRepository>,
        distance_repo: Arc<DistanceRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
        snapshots: Arc<AllocationSnapshotStore>,
        loader: Arc<dyn AllocationInputLoader>,
    ) -> Self {
        let config_reader: Arc<dyn AllocationConfigReader> = config_manager.clone();
        let service = Arc::new(AllocationService::new(
            loader,
            snapshots.clone(),
            config_reader,
            Some(action_log_repo.clone()),
        ));
        let query_api = QueryApi::new(
            snapshots.clone(),
            capacity_repo.clone(),
            volume_repo.clone(),
        );
        let override_api = OverrideApi::new(
            override_repo.clone(),
            capacity_repo.clone(),
            action_log_repo.clone(),
        );

        Self {
            _temp_file: temp_file,
            conn,
            capacity_repo,
            volume_repo,
            override_repo,
            distance_repo,
            action_log_repo,
            config_manager,
            snapshots,
            service,
            query_api,
            override_api,
        }
    }

    // ==========================================
    // 种子数据
    // ==========================================

    pub fn add_depots(&self, depots: &[Depot]) {
        for d in depots {
            self.capacity_repo.upsert(d).expect("写入仓库失败");
        }
    }

    pub fn add_cps(&self, cps: &[CollectionPoint]) {
        for c in cps {
            self.volume_repo.upsert_cp(c).expect("写入集货点失败");
        }
    }

    pub fn add_volume(&self, cp_id: &str, date: NaiveDate, parcels: u32) {
        self.volume_repo
            .insert_if_absent(
                &VolumeRecord {
                    cp_id: cp_id.to_string(),
                    date,
                    parcels,
                },
                TEST_ACTOR,
            )
            .expect("写入货量失败");
    }

    /// 按当前主数据重建距离偏好表
    pub fn rebuild_affinity(&self) {
        let cps = self.volume_repo.list_cps().expect("读取集货点失败");
        let depots = self.capacity_repo.list_all().expect("读取仓库失败");
        let entries = rank_depots_by_distance(&cps, &depots);
        self.distance_repo.rebuild(&entries).expect("重建距离表失败");
    }

    pub fn set_config(&self, key: &str, value: &str) {
        self.config_manager
            .set_config_value(key, value)
            .expect("写入配置失败");
    }
}

/// 东南英格兰小型网络：3 个仓库 + 4 个集货点
///
/// - D_LON (伦敦, 产能 500)
/// - D_CHE (切姆斯福德, 产能 300)
/// - D_BAS (BASILDON, 产能 0)
pub fn seed_small_network(ctx: &TestContext) {
    ctx.add_depots(&[
        depot("D_LON", "LONDON", 51.5074, -0.1278, 500),
        depot("D_CHE", "CHELMSFORD", 51.7356, 0.4685, 300),
        depot("D_BAS", "BASILDON", 51.5761, 0.4887, 0),
    ]);
    ctx.add_cps(&[
        cp("CP_CAM", "CAMDEN", 51.5390, -0.1426),
        cp("CP_ISL", "ISLINGTON", 51.5362, -0.1033),
        cp("CP_BRA", "BRAINTREE", 51.8784, 0.5529),
        cp("CP_WIC", "WICKFORD", 51.6115, 0.5207),
    ]);
    ctx.rebuild_affinity();
}
