// ==========================================
// 集货分配系统 - 集货点与日货量领域模型
// ==========================================
// 说明: 集货点总数约 400 个，但任一日期有货量的通常只是少数
// 红线: 日期范围内的下拉/地图只展示当日有货量的集货点
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// CollectionPoint - 集货点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPoint {
    pub cp_id: String,   // 集货点代码 (CPID)
    pub name: String,    // 集货点名称
    pub latitude: f64,   // 纬度
    pub longitude: f64,  // 经度
    pub is_active: bool, // 是否启用
}

// ==========================================
// VolumeRecord - 日货量
// ==========================================
// 来源: 上游导入；引擎只读
// 无记录视为当日货量 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub cp_id: String,
    pub date: NaiveDate,
    pub parcels: u32,
}
