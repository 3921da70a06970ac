// ==========================================
// 集货分配系统 - 距离偏好计算
// ==========================================
// 职责: 按大圆距离（haversine）为每个集货点排序全部仓库
// 输出: AffinityEntry 列表，由 DistanceRepository 持久化
// ==========================================

use crate::domain::affinity::AffinityEntry;
use crate::domain::collection_point::CollectionPoint;
use crate::domain::depot::Depot;

/// 地球半径（英里）
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// 两点间大圆距离（英里）
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MILES * c
}

/// 为每个集货点按距离为全部仓库排名
///
/// # 说明
/// - 距离保留两位小数
/// - 距离相同按 depot_id 升序，保证排名确定
/// - 不按产能过滤：资格在每次分配时由可用仓库集合决定
pub fn rank_depots_by_distance(cps: &[CollectionPoint], depots: &[Depot]) -> Vec<AffinityEntry> {
    let mut entries = Vec::with_capacity(cps.len() * depots.len());
    for cp in cps {
        let mut distances: Vec<(&str, f64)> = depots
            .iter()
            .map(|d| {
                let miles = haversine_miles(cp.latitude, cp.longitude, d.latitude, d.longitude);
                (d.depot_id.as_str(), (miles * 100.0).round() / 100.0)
            })
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        entries.extend(distances.into_iter().enumerate().map(|(idx, (depot_id, miles))| {
            AffinityEntry {
                cp_id: cp.cp_id.clone(),
                depot_id: depot_id.to_string(),
                distance_miles: Some(miles),
                rank: idx as u32 + 1,
            }
        }));
    }
    entries
}
