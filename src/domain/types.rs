// ==========================================
// 集货分配系统 - 领域类型定义
// ==========================================
// 红线: 零产能仓库永远不是分配目标
// 红线: 人工覆写优先于自动分配
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 分配来源 (Allocation Source)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// 排序: Override < Automatic，同一集货点下覆写记录排在前面
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationSource {
    Override,  // 人工覆写
    Automatic, // 自动分配
}

impl AllocationSource {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AllocationSource::Override => "OVERRIDE",
            AllocationSource::Automatic => "AUTOMATIC",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "OVERRIDE" => Some(AllocationSource::Override),
            "AUTOMATIC" => Some(AllocationSource::Automatic),
            _ => None,
        }
    }
}

impl fmt::Display for AllocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 未分配原因 (Unallocated Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnallocatedReason {
    CapacityExhausted, // 所有可用仓库剩余产能耗尽
    OverrideCapped,    // 覆写限定量小于集货点当日货量，剩余部分不再自动分配
}

impl fmt::Display for UnallocatedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnallocatedReason::CapacityExhausted => write!(f, "CAPACITY_EXHAUSTED"),
            UnallocatedReason::OverrideCapped => write!(f, "OVERRIDE_CAPPED"),
        }
    }
}

// ==========================================
// 覆写跳过原因 (Override Skip Reason)
// ==========================================
// 覆写写入时已校验目标仓库；此处处理的是写入后仓库状态变化的情况
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideSkipReason {
    TargetIneligible, // 目标仓库当日停用或产能为 0
}

impl fmt::Display for OverrideSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideSkipReason::TargetIneligible => write!(f, "TARGET_INELIGIBLE"),
        }
    }
}

// ==========================================
// 实体引用 (Entity Reference)
// ==========================================
// 用途: 明细查询、成本记录的主体
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityRef {
    Cp(String),
    Depot(String),
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Cp(id) | EntityRef::Depot(id) => id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Cp(id) => write!(f, "CP:{}", id),
            EntityRef::Depot(id) => write!(f, "DEPOT:{}", id),
        }
    }
}
