// ==========================================
// 集货分配系统 - 主数据导入（集货点 / 仓库）
// ==========================================
// 集货点列: CPID, Collection Name, Latitude, Longitude
// 仓库列:   DepotID, DepotName, Latitude, Longitude, Daily Capacity（缺失按 0）
// 规则: 已存在的代码跳过，不覆盖；导入后重建距离排名
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::engine::affinity::rank_depots_by_distance;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{FieldMapper, CP_COLUMNS, DEPOT_COLUMNS};
use crate::importer::file_parser::{ensure_columns, RawRecord, UniversalFileParser};
use crate::repository::{
    ActionLogRepository, CapacityRepository, DistanceRepository, VolumeRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterDataImportSummary {
    pub entity: String,
    pub total_rows: usize,
    pub imported: usize,
    pub skipped_existing: usize,
    pub skipped_invalid: usize,
    pub errors: Vec<String>,
    pub distance_rows: usize, // 重建后的距离记录数
}

pub struct MasterDataImporter {
    volume_repo: Arc<VolumeRepository>,
    capacity_repo: Arc<CapacityRepository>,
    distance_repo: Arc<DistanceRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    parser: UniversalFileParser,
    mapper: FieldMapper,
}

impl MasterDataImporter {
    pub fn new(
        volume_repo: Arc<VolumeRepository>,
        capacity_repo: Arc<CapacityRepository>,
        distance_repo: Arc<DistanceRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            volume_repo,
            capacity_repo,
            distance_repo,
            action_log_repo,
            parser: UniversalFileParser,
            mapper: FieldMapper,
        }
    }

    /// 导入集货点文件
    #[instrument(skip(self, file_path))]
    pub fn import_collection_points_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        actor: &str,
    ) -> ImportResult<MasterDataImportSummary> {
        let records = self.parser.parse(file_path)?;
        self.import_collection_points(&records, actor)
    }

    /// 导入仓库文件
    #[instrument(skip(self, file_path))]
    pub fn import_depots_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        actor: &str,
    ) -> ImportResult<MasterDataImportSummary> {
        let records = self.parser.parse(file_path)?;
        self.import_depots(&records, actor)
    }

    pub fn import_collection_points(
        &self,
        records: &[RawRecord],
        actor: &str,
    ) -> ImportResult<MasterDataImportSummary> {
        ensure_columns(records, CP_COLUMNS)?;
        let mut summary = MasterDataImportSummary {
            entity: "CollectionPoint".to_string(),
            total_rows: records.len(),
            ..Default::default()
        };

        for (idx, row) in records.iter().enumerate() {
            match self.mapper.map_cp_row(row, idx + 2) {
                Ok(cp) => {
                    if self.volume_repo.insert_cp_if_absent(&cp)? {
                        summary.imported += 1;
                    } else {
                        summary.skipped_existing += 1;
                    }
                }
                Err(e) => {
                    summary.skipped_invalid += 1;
                    summary.errors.push(e.to_string());
                }
            }
        }

        self.finish(summary, actor)
    }

    pub fn import_depots(
        &self,
        records: &[RawRecord],
        actor: &str,
    ) -> ImportResult<MasterDataImportSummary> {
        ensure_columns(records, DEPOT_COLUMNS)?;
        let mut summary = MasterDataImportSummary {
            entity: "Depot".to_string(),
            total_rows: records.len(),
            ..Default::default()
        };

        for (idx, row) in records.iter().enumerate() {
            match self.mapper.map_depot_row(row, idx + 2) {
                Ok(depot) => {
                    if self.capacity_repo.insert_if_absent(&depot)? {
                        summary.imported += 1;
                    } else {
                        summary.skipped_existing += 1;
                    }
                }
                Err(e) => {
                    summary.skipped_invalid += 1;
                    summary.errors.push(e.to_string());
                }
            }
        }

        self.finish(summary, actor)
    }

    /// 重建全部集货点 → 仓库距离排名
    #[instrument(skip(self))]
    pub fn rebuild_distances(&self) -> ImportResult<usize> {
        let cps = self.volume_repo.list_cps()?;
        let depots = self.capacity_repo.list_all()?;
        let entries = rank_depots_by_distance(&cps, &depots);
        let rows = self.distance_repo.rebuild(&entries)?;
        info!(cps = cps.len(), depots = depots.len(), rows, "距离排名已重建");
        Ok(rows)
    }

    fn finish(
        &self,
        mut summary: MasterDataImportSummary,
        actor: &str,
    ) -> ImportResult<MasterDataImportSummary> {
        if summary.imported > 0 {
            summary.distance_rows = self.rebuild_distances()?;
        }
        info!(
            entity = %summary.entity,
            imported = summary.imported,
            skipped_existing = summary.skipped_existing,
            skipped_invalid = summary.skipped_invalid,
            "主数据导入完成"
        );

        let log = ActionLog::new(ActionType::MasterDataImport, actor)
            .with_entity(&summary.entity, format!("{} rows", summary.total_rows))
            .with_values(None, Some(json!(summary)))
            .with_detail(format!(
                "Imported {}, skipped {}",
                summary.imported,
                summary.skipped_existing + summary.skipped_invalid
            ));
        self.action_log_repo.insert(&log)?;
        Ok(summary)
    }
}
