// ==========================================
// 集货分配系统 - 引擎层错误类型
// ==========================================
// 红线: 重算失败时之前的分配集保持可见
// ==========================================

use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use thiserror::Error;

/// 分配重算错误
#[derive(Error, Debug)]
pub enum RecalcError {
    /// 当日没有任何可分配仓库（致命，不产生分配集）
    #[error("当日无可用仓库: date={date}")]
    NoEligibleDepots { date: NaiveDate },

    /// 登记数据读取超时（可重试）
    #[error("登记数据读取超时: date={date}, timeout_ms={timeout_ms}")]
    RegistryTimeout { date: NaiveDate, timeout_ms: u64 },

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error("后台任务失败: {0}")]
    TaskJoin(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RecalcError {
    /// 是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecalcError::RegistryTimeout { .. }
                | RecalcError::Repository(RepositoryError::LockError(_))
        )
    }
}

pub type RecalcResult<T> = Result<T, RecalcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        assert!(RecalcError::RegistryTimeout { date, timeout_ms: 10 }.is_retryable());
        assert!(!RecalcError::NoEligibleDepots { date }.is_retryable());
        assert!(RecalcError::Repository(RepositoryError::LockError("poisoned".into())).is_retryable());
    }
}
