// ==========================================
// 集货分配系统 - 数据导入层
// ==========================================
// 职责: 外部文件 (Excel/CSV) → 集货点/仓库主数据、日货量
// 流程: 文件解析 → 字段映射 → 行校验 → 写入仓储 → 审计
// ==========================================

pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod master_data_importer;
pub mod volume_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRecord, UniversalFileParser};
pub use master_data_importer::{MasterDataImportSummary, MasterDataImporter};
pub use volume_importer::{VolumeImportSummary, VolumeImporter};
