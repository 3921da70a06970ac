// ==========================================
// 集货分配系统 - 日货量导入
// ==========================================
// 必需列: Date, CPID, Parcels（其余列忽略）
// 规则: 未知集货点 → 行错误并跳过；已存在的 (cp, date) → 跳过不覆盖
// 红线: 导入必须留痕 (VOLUME_IMPORT)
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, VOLUME_COLUMNS};
use crate::importer::file_parser::{ensure_columns, RawRecord, UniversalFileParser};
use crate::repository::{ActionLogRepository, VolumeRepository};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ==========================================
// VolumeImportSummary - 导入结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub skipped_existing: usize,
    pub skipped_invalid: usize,
    pub errors: Vec<String>,
    /// 有新写入货量的日期（需要重算）
    pub affected_dates: Vec<NaiveDate>,
}

impl VolumeImportSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_existing + self.skipped_invalid
    }

    /// 前 n 条错误（界面提示用）
    pub fn first_errors(&self, n: usize) -> &[String] {
        &self.errors[..self.errors.len().min(n)]
    }
}

// ==========================================
// VolumeImporter - 货量导入器
// ==========================================
pub struct VolumeImporter {
    volume_repo: Arc<VolumeRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    parser: UniversalFileParser,
    mapper: FieldMapper,
}

impl VolumeImporter {
    pub fn new(volume_repo: Arc<VolumeRepository>, action_log_repo: Arc<ActionLogRepository>) -> Self {
        Self {
            volume_repo,
            action_log_repo,
            parser: UniversalFileParser,
            mapper: FieldMapper,
        }
    }

    /// 导入货量文件（CSV/XLSX）
    #[instrument(skip(self, file_path), fields(file = %file_path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        actor: &str,
    ) -> ImportResult<VolumeImportSummary> {
        let path = file_path.as_ref();
        let records = self.parser.parse(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.import_records(&records, &source, actor)
    }

    /// 导入已解析的原始行
    ///
    /// # 参数
    /// - `records`: 原始行
    /// - `source`: 来源标识（文件名），写入审计
    /// - `actor`: 操作人
    pub fn import_records(
        &self,
        records: &[RawRecord],
        source: &str,
        actor: &str,
    ) -> ImportResult<VolumeImportSummary> {
        ensure_columns(records, VOLUME_COLUMNS)?;

        let known_cps: HashSet<String> = self
            .volume_repo
            .list_cps()?
            .into_iter()
            .map(|cp| cp.cp_id)
            .collect();

        let mut summary = VolumeImportSummary {
            total_rows: records.len(),
            ..Default::default()
        };
        let mut affected: BTreeSet<NaiveDate> = BTreeSet::new();

        for (idx, row) in records.iter().enumerate() {
            // 表头为第 1 行
            let row_number = idx + 2;

            let record = match self.mapper.map_volume_row(row, row_number) {
                Ok(r) => r,
                Err(e) => {
                    summary.skipped_invalid += 1;
                    summary.errors.push(e.to_string());
                    continue;
                }
            };

            if !known_cps.contains(&record.cp_id) {
                summary.skipped_invalid += 1;
                summary.errors.push(
                    ImportError::UnknownCollectionPoint {
                        row: row_number,
                        cp_id: record.cp_id.clone(),
                    }
                    .to_string(),
                );
                continue;
            }

            if self.volume_repo.insert_if_absent(&record, actor)? {
                summary.imported += 1;
                affected.insert(record.date);
            } else {
                summary.skipped_existing += 1;
            }
        }
        summary.affected_dates = affected.into_iter().collect();

        info!(
            imported = summary.imported,
            skipped_existing = summary.skipped_existing,
            skipped_invalid = summary.skipped_invalid,
            "货量导入完成"
        );
        if !summary.errors.is_empty() {
            warn!(errors = summary.errors.len(), first = ?summary.first_errors(3), "货量导入存在行错误");
        }

        let log = ActionLog::new(ActionType::VolumeImport, actor)
            .with_entity("DailyVolume", source)
            .with_values(None, Some(json!(summary)))
            .with_detail(format!(
                "Imported {}, skipped {}",
                summary.imported,
                summary.skipped()
            ));
        self.action_log_repo.insert(&log)?;

        Ok(summary)
    }
}
