// ==========================================
// 集货分配系统 - 操作日志领域模型
// ==========================================
// 红线: 所有人工写入与重算必须留痕
// 用途: 审计追踪
// 对齐: action_log 表
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,            // 日志ID (UUID)
    pub action_type: String,          // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,     // 操作时间戳
    pub actor: String,                // 操作人

    pub entity_type: Option<String>,  // 实体类型 (ManualOverride / CapacityOverride / Depot ...)
    pub entity_id: Option<String>,    // 实体标识
    pub target_date: Option<NaiveDate>, // 影响日期

    pub old_value: Option<JsonValue>, // 变更前
    pub new_value: Option<JsonValue>, // 变更后
    pub detail: Option<String>,       // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    OverrideCreated,
    OverrideUpdated,
    OverrideDeleted,
    CapacityOverrideCreated,
    CapacityOverrideDeleted,
    DepotCapacityUpdated,
    DepotStatusChanged,
    VolumeImport,
    MasterDataImport,
    Recalc,
    RecalcFailed,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::OverrideCreated => "OVERRIDE_CREATED",
            ActionType::OverrideUpdated => "OVERRIDE_UPDATED",
            ActionType::OverrideDeleted => "OVERRIDE_DELETED",
            ActionType::CapacityOverrideCreated => "CAPACITY_OVERRIDE_CREATED",
            ActionType::CapacityOverrideDeleted => "CAPACITY_OVERRIDE_DELETED",
            ActionType::DepotCapacityUpdated => "DEPOT_CAPACITY_UPDATED",
            ActionType::DepotStatusChanged => "DEPOT_STATUS_CHANGED",
            ActionType::VolumeImport => "VOLUME_IMPORT",
            ActionType::MasterDataImport => "MASTER_DATA_IMPORT",
            ActionType::Recalc => "RECALC",
            ActionType::RecalcFailed => "RECALC_FAILED",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OVERRIDE_CREATED" => Some(ActionType::OverrideCreated),
            "OVERRIDE_UPDATED" => Some(ActionType::OverrideUpdated),
            "OVERRIDE_DELETED" => Some(ActionType::OverrideDeleted),
            "CAPACITY_OVERRIDE_CREATED" => Some(ActionType::CapacityOverrideCreated),
            "CAPACITY_OVERRIDE_DELETED" => Some(ActionType::CapacityOverrideDeleted),
            "DEPOT_CAPACITY_UPDATED" => Some(ActionType::DepotCapacityUpdated),
            "DEPOT_STATUS_CHANGED" => Some(ActionType::DepotStatusChanged),
            "VOLUME_IMPORT" => Some(ActionType::VolumeImport),
            "MASTER_DATA_IMPORT" => Some(ActionType::MasterDataImport),
            "RECALC" => Some(ActionType::Recalc),
            "RECALC_FAILED" => Some(ActionType::RecalcFailed),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志（自动生成 action_id 与时间戳）
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            entity_type: None,
            entity_id: None,
            target_date: None,
            old_value: None,
            new_value: None,
            detail: None,
        }
    }

    /// 设置影响实体
    pub fn with_entity(mut self, entity_type: &str, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    pub fn with_values(mut self, old_value: Option<JsonValue>, new_value: Option<JsonValue>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
