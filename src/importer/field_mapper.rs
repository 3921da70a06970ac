// ==========================================
// 集货分配系统 - 字段映射器实现
// ==========================================
// 职责: 原始行 → 领域记录 + 类型转换
// 日期: 支持 YYYY-MM-DD / DD/MM/YYYY / YYYY-MM-DD HH:MM:SS / Excel 序列号
// ==========================================

use crate::domain::collection_point::{CollectionPoint, VolumeRecord};
use crate::domain::depot::Depot;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRecord;
use chrono::{Duration, NaiveDate, NaiveDateTime};

// 列名
pub const COL_DATE: &str = "Date";
pub const COL_CPID: &str = "CPID";
pub const COL_PARCELS: &str = "Parcels";
pub const COL_CP_NAME: &str = "Collection Name";
pub const COL_DEPOT_ID: &str = "DepotID";
pub const COL_DEPOT_NAME: &str = "DepotName";
pub const COL_LATITUDE: &str = "Latitude";
pub const COL_LONGITUDE: &str = "Longitude";
pub const COL_DAILY_CAPACITY: &str = "Daily Capacity";

pub const VOLUME_COLUMNS: &[&str] = &[COL_DATE, COL_CPID, COL_PARCELS];
pub const CP_COLUMNS: &[&str] = &[COL_CPID, COL_CP_NAME, COL_LATITUDE, COL_LONGITUDE];
pub const DEPOT_COLUMNS: &[&str] = &[COL_DEPOT_ID, COL_DEPOT_NAME, COL_LATITUDE, COL_LONGITUDE];

pub struct FieldMapper;

impl FieldMapper {
    /// 货量行 (Date, CPID, Parcels)
    pub fn map_volume_row(&self, row: &RawRecord, row_number: usize) -> ImportResult<VolumeRecord> {
        Ok(VolumeRecord {
            cp_id: self.require_string(row, COL_CPID, row_number)?,
            date: self.parse_date(row, COL_DATE, row_number)?,
            parcels: self.parse_count(row, COL_PARCELS, row_number)?.unwrap_or(0),
        })
    }

    /// 集货点行 (CPID, Collection Name, Latitude, Longitude)
    pub fn map_cp_row(&self, row: &RawRecord, row_number: usize) -> ImportResult<CollectionPoint> {
        Ok(CollectionPoint {
            cp_id: self.require_string(row, COL_CPID, row_number)?,
            name: self.get_string(row, COL_CP_NAME).unwrap_or_default(),
            latitude: self.require_f64(row, COL_LATITUDE, row_number)?,
            longitude: self.require_f64(row, COL_LONGITUDE, row_number)?,
            is_active: true,
        })
    }

    /// 仓库行 (DepotID, DepotName, Latitude, Longitude, Daily Capacity)
    ///
    /// Daily Capacity 缺失按 0 处理（仓库可见但不可分配）
    pub fn map_depot_row(&self, row: &RawRecord, row_number: usize) -> ImportResult<Depot> {
        Ok(Depot {
            depot_id: self.require_string(row, COL_DEPOT_ID, row_number)?,
            name: self.get_string(row, COL_DEPOT_NAME).unwrap_or_default(),
            latitude: self.require_f64(row, COL_LATITUDE, row_number)?,
            longitude: self.require_f64(row, COL_LONGITUDE, row_number)?,
            daily_capacity: self
                .parse_count(row, COL_DAILY_CAPACITY, row_number)?
                .unwrap_or(0),
            is_active: true,
        })
    }

    fn get_string(&self, row: &RawRecord, key: &str) -> Option<String> {
        row.get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn require_string(&self, row: &RawRecord, key: &str, row_number: usize) -> ImportResult<String> {
        self.get_string(row, key).ok_or_else(|| ImportError::FieldMissing {
            row: row_number,
            field: key.to_string(),
        })
    }

    fn require_f64(&self, row: &RawRecord, key: &str, row_number: usize) -> ImportResult<f64> {
        let value = self.require_string(row, key, row_number)?;
        value
            .parse::<f64>()
            .map_err(|_| ImportError::TypeConversionError {
                row: row_number,
                field: key.to_string(),
                message: format!("无法解析为数值: {}", value),
            })
    }

    /// 解析非负整数（Excel 数值单元格可能为 "120.0"）
    fn parse_count(&self, row: &RawRecord, key: &str, row_number: usize) -> ImportResult<Option<u32>> {
        let Some(value) = self.get_string(row, key) else {
            return Ok(None);
        };
        let conversion_error = |message: String| ImportError::TypeConversionError {
            row: row_number,
            field: key.to_string(),
            message,
        };

        let number = value
            .replace(',', "")
            .parse::<f64>()
            .map_err(|_| conversion_error(format!("无法解析为整数: {}", value)))?;
        if number < 0.0 {
            return Err(conversion_error(format!("不能为负数: {}", value)));
        }
        if number.fract() != 0.0 || number > u32::MAX as f64 {
            return Err(conversion_error(format!("不是有效件数: {}", value)));
        }
        Ok(Some(number as u32))
    }

    fn parse_date(&self, row: &RawRecord, key: &str, row_number: usize) -> ImportResult<NaiveDate> {
        let value = self.require_string(row, key, row_number)?;
        parse_date_text(&value).ok_or_else(|| ImportError::TypeConversionError {
            row: row_number,
            field: key.to_string(),
            message: format!("日期格式无法识别: {}", value),
        })
    }
}

/// 解析日期文本
pub fn parse_date_text(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    // Excel 日期序列号（1900 日期系统）
    let serial = value.parse::<f64>().ok()?;
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 6);
        assert_eq!(parse_date_text("2026-01-06"), expected);
        assert_eq!(parse_date_text("06/01/2026"), expected);
        assert_eq!(parse_date_text("2026-01-06 00:00:00"), expected);
        assert_eq!(parse_date_text("46028"), expected);
        assert_eq!(parse_date_text("not a date"), None);
    }

    #[test]
    fn test_volume_row_rejects_negative_parcels() {
        let mapper = FieldMapper;
        let err = mapper
            .map_volume_row(&row(&[("Date", "2026-01-06"), ("CPID", "CP001"), ("Parcels", "-5")]), 2)
            .unwrap_err();
        assert!(matches!(err, ImportError::TypeConversionError { row: 2, .. }));

        let ok = mapper
            .map_volume_row(&row(&[("Date", "2026-01-06"), ("CPID", "CP001"), ("Parcels", "120.0")]), 3)
            .unwrap();
        assert_eq!(ok.parcels, 120);
    }

    #[test]
    fn test_depot_missing_capacity_defaults_to_zero() {
        let depot = FieldMapper
            .map_depot_row(
                &row(&[
                    ("DepotID", "BASILDON"),
                    ("DepotName", "Basildon"),
                    ("Latitude", "51.57"),
                    ("Longitude", "0.46"),
                    ("Daily Capacity", ""),
                ]),
                2,
            )
            .unwrap();
        assert_eq!(depot.daily_capacity, 0);
        assert!(!depot.is_eligible());
    }
}
