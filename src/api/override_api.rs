// ==========================================
// 集货分配系统 - 人工覆写 API
// ==========================================
// 职责: 覆写的新增/修改/删除/查询，写入前校验目标仓库
// 红线: 覆写目标不得为停用或当日产能为 0 的仓库（写入时拒绝）
// 红线: 基线版本过期的修改/删除一律拒绝，不做静默覆盖
// 红线: 每次写入都留审计记录
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::manual_override::{ManualOverride, OverrideDraft};
use crate::repository::{ActionLogRepository, CapacityRepository, OverrideRepository};

const ENTITY_TYPE: &str = "ManualOverride";

// ==========================================
// OverrideApi - 人工覆写 API
// ==========================================
pub struct OverrideApi {
    override_repo: Arc<OverrideRepository>,
    capacity_repo: Arc<CapacityRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl OverrideApi {
    /// 创建新的 OverrideApi 实例
    ///
    /// # 参数
    /// - override_repo: 覆写仓储
    /// - capacity_repo: 目标仓库校验
    /// - action_log_repo: 审计日志
    pub fn new(
        override_repo: Arc<OverrideRepository>,
        capacity_repo: Arc<CapacityRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            override_repo,
            capacity_repo,
            action_log_repo,
        }
    }

    fn check_draft(draft: &OverrideDraft) -> ApiResult<()> {
        if draft.cp_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("集货点代码不能为空".to_string()));
        }
        if draft.depot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("目标仓库代码不能为空".to_string()));
        }
        Ok(())
    }

    fn check_actor(actor: &str) -> ApiResult<()> {
        if actor.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        Ok(())
    }

    fn entity_id(cp_id: &str, date: NaiveDate) -> String {
        format!("{}@{}", cp_id, date)
    }

    fn audit(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, action_type = %log.action_type, "记录操作日志失败");
        }
    }

    /// 校验覆写目标（不写入）
    ///
    /// # 返回
    /// - Ok(()): 目标仓库当日可用
    /// - Err(InvalidTarget): 目标停用或当日产能为 0
    /// - Err(NotFound): 仓库代码未知
    pub fn validate(&self, draft: &OverrideDraft) -> ApiResult<()> {
        Self::check_draft(draft)?;
        self.override_repo.validate(draft, &self.capacity_repo)?;
        Ok(())
    }

    /// 新增覆写
    ///
    /// # 返回
    /// - Ok(ManualOverride): version = 1
    /// - Err(DuplicateOverride): 该集货点当日已有覆写
    /// - Err(InvalidTarget / NotFound): 目标校验失败
    pub fn create_override(&self, draft: &OverrideDraft, actor: &str) -> ApiResult<ManualOverride> {
        Self::check_actor(actor)?;
        self.validate(draft)?;

        let created = self.override_repo.create(draft, actor)?;
        info!(cp_id = %created.cp_id, date = %created.date, depot_id = %created.depot_id, "覆写已创建");

        self.audit(
            ActionLog::new(ActionType::OverrideCreated, actor)
                .with_entity(ENTITY_TYPE, Self::entity_id(&created.cp_id, created.date))
                .with_date(created.date)
                .with_values(None, Some(json!(&created))),
        );
        Ok(created)
    }

    /// 修改覆写目标/限定量
    ///
    /// # 参数
    /// - base_version: 调用方读取时的版本号
    ///
    /// # 返回
    /// - Ok(ManualOverride): 更新后的记录（version + 1）
    /// - Err(Conflict): 基线版本已过期
    /// - Err(NotFound): 覆写不存在
    pub fn update_override(
        &self,
        draft: &OverrideDraft,
        base_version: i64,
        actor: &str,
    ) -> ApiResult<ManualOverride> {
        Self::check_actor(actor)?;
        self.validate(draft)?;

        let (before, after) = self.override_repo.update(draft, base_version)?;
        info!(
            cp_id = %after.cp_id,
            date = %after.date,
            depot_id = %after.depot_id,
            version = after.version,
            "覆写已更新"
        );

        self.audit(
            ActionLog::new(ActionType::OverrideUpdated, actor)
                .with_entity(ENTITY_TYPE, Self::entity_id(&after.cp_id, after.date))
                .with_date(after.date)
                .with_values(Some(json!(&before)), Some(json!(&after))),
        );
        Ok(after)
    }

    /// 删除覆写
    ///
    /// # 返回
    /// - Ok(ManualOverride): 被删除的记录
    /// - Err(Conflict): 基线版本已过期
    /// - Err(NotFound): 覆写不存在
    pub fn delete_override(
        &self,
        cp_id: &str,
        date: NaiveDate,
        base_version: i64,
        actor: &str,
    ) -> ApiResult<ManualOverride> {
        Self::check_actor(actor)?;
        if cp_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("集货点代码不能为空".to_string()));
        }

        let deleted = self.override_repo.delete(cp_id, date, base_version)?;
        info!(cp_id = %cp_id, date = %date, "覆写已删除");

        self.audit(
            ActionLog::new(ActionType::OverrideDeleted, actor)
                .with_entity(ENTITY_TYPE, Self::entity_id(cp_id, date))
                .with_date(date)
                .with_values(Some(json!(&deleted)), None),
        );
        Ok(deleted)
    }

    /// 查询某日全部覆写（按 cp_id 升序）
    pub fn list_overrides(&self, date: NaiveDate) -> ApiResult<Vec<ManualOverride>> {
        Ok(self.override_repo.get_overrides(date)?)
    }

    /// 查询单个覆写
    pub fn get_override(&self, cp_id: &str, date: NaiveDate) -> ApiResult<Option<ManualOverride>> {
        Ok(self.override_repo.find(cp_id, date)?)
    }
}
