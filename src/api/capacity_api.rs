// ==========================================
// 集货分配系统 - 仓库产能 API
// ==========================================
// 职责: 仓库产能维护、启停、日度产能覆写
// 红线: 产能变更不会自动触发重算，由调用方决定何时重算受影响日期
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::depot::{CapacityOverride, Depot};
use crate::repository::{ActionLogRepository, CapacityRepository, RepositoryError};

pub struct CapacityApi {
    capacity_repo: Arc<CapacityRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl CapacityApi {
    pub fn new(
        capacity_repo: Arc<CapacityRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            capacity_repo,
            action_log_repo,
        }
    }

    fn require_depot(&self, depot_id: &str) -> ApiResult<Depot> {
        if depot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("仓库代码不能为空".to_string()));
        }
        self.capacity_repo
            .find_by_id(depot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("仓库{}不存在", depot_id)))
    }

    fn audit(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = %log.action_type, "记录操作日志失败");
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn list_depots(&self) -> ApiResult<Vec<Depot>> {
        Ok(self.capacity_repo.list_all()?)
    }

    /// 某日可分配仓库及有效产能
    pub fn list_eligible_depots(&self, date: NaiveDate) -> ApiResult<BTreeMap<String, u32>> {
        Ok(self.capacity_repo.list_eligible_depots(date)?)
    }

    pub fn effective_capacity(&self, depot_id: &str, date: NaiveDate) -> ApiResult<u32> {
        Ok(self.capacity_repo.effective_capacity(depot_id, date)?)
    }

    // ==========================================
    // 仓库主数据维护
    // ==========================================

    /// 修改仓库日常产能
    ///
    /// # 返回
    /// - Ok(old_capacity)
    /// - Err(NotFound): 仓库不存在
    pub fn update_capacity(&self, depot_id: &str, capacity: u32, actor: &str) -> ApiResult<u32> {
        self.require_depot(depot_id)?;
        let old = self.capacity_repo.update_capacity(depot_id, capacity)?;
        info!(depot_id = %depot_id, old, new = capacity, "仓库产能已更新");

        self.audit(
            ActionLog::new(ActionType::DepotCapacityUpdated, actor)
                .with_entity("Depot", depot_id)
                .with_values(
                    Some(json!({ "daily_capacity": old })),
                    Some(json!({ "daily_capacity": capacity })),
                ),
        );
        Ok(old)
    }

    /// 启用/停用仓库
    pub fn set_depot_active(&self, depot_id: &str, is_active: bool, actor: &str) -> ApiResult<()> {
        let depot = self.require_depot(depot_id)?;
        self.capacity_repo.set_active(depot_id, is_active)?;
        info!(depot_id = %depot_id, is_active, "仓库状态已更新");

        self.audit(
            ActionLog::new(ActionType::DepotStatusChanged, actor)
                .with_entity("Depot", depot_id)
                .with_values(
                    Some(json!({ "is_active": depot.is_active })),
                    Some(json!({ "is_active": is_active })),
                ),
        );
        Ok(())
    }

    // ==========================================
    // 日度产能覆写
    // ==========================================

    /// 新增日度产能覆写
    ///
    /// # 返回
    /// - Ok(CapacityOverride)
    /// - Err(NotFound): 仓库不存在
    /// - Err(BusinessRuleViolation): 该仓库当日已有产能覆写
    pub fn create_capacity_override(
        &self,
        depot_id: &str,
        date: NaiveDate,
        override_capacity: u32,
        reason: Option<String>,
        actor: &str,
    ) -> ApiResult<CapacityOverride> {
        self.require_depot(depot_id)?;

        let record = CapacityOverride {
            depot_id: depot_id.to_string(),
            date,
            override_capacity,
            reason,
            created_by: actor.to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        self.capacity_repo
            .insert_capacity_override(&record)
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => ApiError::BusinessRuleViolation(
                    format!("仓库{}在{}已有产能覆写", depot_id, date),
                ),
                other => other.into(),
            })?;
        info!(depot_id = %depot_id, date = %date, capacity = override_capacity, "产能覆写已创建");

        self.audit(
            ActionLog::new(ActionType::CapacityOverrideCreated, actor)
                .with_entity("CapacityOverride", format!("{}@{}", depot_id, date))
                .with_date(date)
                .with_values(None, Some(json!(&record))),
        );
        Ok(record)
    }

    /// 删除日度产能覆写
    ///
    /// # 返回
    /// - Ok(CapacityOverride): 被删除的记录
    /// - Err(NotFound): 不存在
    pub fn delete_capacity_override(
        &self,
        depot_id: &str,
        date: NaiveDate,
        actor: &str,
    ) -> ApiResult<CapacityOverride> {
        let deleted = self
            .capacity_repo
            .delete_capacity_override(depot_id, date)?
            .ok_or_else(|| ApiError::NotFound(format!("仓库{}在{}无产能覆写", depot_id, date)))?;
        info!(depot_id = %depot_id, date = %date, "产能覆写已删除");

        self.audit(
            ActionLog::new(ActionType::CapacityOverrideDeleted, actor)
                .with_entity("CapacityOverride", format!("{}@{}", depot_id, date))
                .with_date(date)
                .with_values(Some(json!(&deleted)), None),
        );
        Ok(deleted)
    }

    pub fn list_capacity_overrides(&self, date: NaiveDate) -> ApiResult<Vec<CapacityOverride>> {
        Ok(self.capacity_repo.list_capacity_overrides(date)?)
    }
}
