// ==========================================
// 集货分配系统 - 仓库领域模型
// ==========================================
// 红线: capacity == 0 或停用的仓库不得作为任何分配目标
// 用途: 产能登记、地图展示
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Depot - 仓库
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Depot {
    pub depot_id: String,     // 仓库代码 (如 D042)
    pub name: String,         // 仓库名称
    pub latitude: f64,        // 纬度
    pub longitude: f64,       // 经度
    pub daily_capacity: u32,  // 日处理能力 (件/天)
    pub is_active: bool,      // 是否启用
}

impl Depot {
    /// 在给定有效产能下是否可作为分配目标
    ///
    /// # 参数
    /// - `effective_capacity`: 当日有效产能（已应用产能覆写）
    pub fn is_eligible_with(&self, effective_capacity: u32) -> bool {
        self.is_active && effective_capacity > 0
    }

    /// 在日常产能下是否可作为分配目标
    pub fn is_eligible(&self) -> bool {
        self.is_eligible_with(self.daily_capacity)
    }
}

// ==========================================
// CapacityOverride - 日度产能覆写
// ==========================================
// 用途: 某日临时调整仓库产能（节假日、设备检修等）
// 约束: 同一 (depot_id, date) 仅允许一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityOverride {
    pub depot_id: String,
    pub date: NaiveDate,
    pub override_capacity: u32,
    pub reason: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depot(capacity: u32, active: bool) -> Depot {
        Depot {
            depot_id: "D001".to_string(),
            name: "BASILDON".to_string(),
            latitude: 51.57,
            longitude: 0.46,
            daily_capacity: capacity,
            is_active: active,
        }
    }

    #[test]
    fn test_zero_capacity_is_not_eligible() {
        assert!(!depot(0, true).is_eligible());
        assert!(depot(10, true).is_eligible());
    }

    #[test]
    fn test_inactive_is_not_eligible_even_with_override() {
        assert!(!depot(500, false).is_eligible_with(800));
        assert!(depot(0, true).is_eligible_with(800));
    }
}
