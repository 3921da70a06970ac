// ==========================================
// 集货分配系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换仓储/引擎/导入错误为用户可操作的错误消息
// ==========================================

use crate::engine::error::RecalcError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 覆写写入校验错误（返回给操作员）
    // ==========================================
    #[error("覆写已存在: 集货点 {cp_id} 在 {date} 已有覆写")]
    DuplicateOverride { cp_id: String, date: NaiveDate },

    #[error("无效的覆写目标: 仓库 {depot_id}，{reason}")]
    InvalidTarget { depot_id: String, reason: String },

    #[error("覆写已被他人修改: 集货点 {cp_id} 在 {date}（基线版本 {expected}，当前版本 {actual}）")]
    Conflict {
        cp_id: String,
        date: NaiveDate,
        expected: i64,
        actual: i64,
    },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 分配重算错误
    // ==========================================
    #[error("当日无可用仓库: {date}")]
    NoEligibleDepots { date: NaiveDate },

    #[error("登记数据读取超时（可重试）: {date}")]
    RegistryTimeout { date: NaiveDate },

    #[error("该日期尚无分配结果: {date}")]
    SnapshotMissing { date: NaiveDate },

    #[error("分配重算失败: {0}")]
    RecalcFailed(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 是否可重试（超时/锁竞争）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RegistryTimeout { .. } | ApiError::DatabaseConnectionError(_)
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 覆写写入校验
            RepositoryError::DuplicateOverride { cp_id, date } => {
                ApiError::DuplicateOverride { cp_id, date }
            }
            RepositoryError::InvalidTarget { depot_id, reason } => {
                ApiError::InvalidTarget { depot_id, reason }
            }
            RepositoryError::Conflict {
                cp_id,
                date,
                expected,
                actual,
            } => ApiError::Conflict {
                cp_id,
                date,
                expected,
                actual,
            },

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 RecalcError 转换
// ==========================================
impl From<RecalcError> for ApiError {
    fn from(err: RecalcError) -> Self {
        match err {
            RecalcError::NoEligibleDepots { date } => ApiError::NoEligibleDepots { date },
            RecalcError::RegistryTimeout { date, .. } => ApiError::RegistryTimeout { date },
            RecalcError::Repository(e) => ApiError::from(e),
            other => ApiError::RecalcFailed(other.to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::MissingColumns(_) => ApiError::ValidationError(err.to_string()),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_errors_keep_their_identity() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let api: ApiError = RepositoryError::Conflict {
            cp_id: "CP001".into(),
            date,
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(api, ApiError::Conflict { expected: 1, actual: 2, .. }));

        let api: ApiError = RecalcError::RegistryTimeout { date, timeout_ms: 5 }.into();
        assert!(api.is_retryable());
    }
}
