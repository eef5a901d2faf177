//! 地理计算基础工具
//!
//! 提供坐标校验和大圆距离计算，供调度打分和客户范围查询使用。
//! 所有函数均为纯函数，可安全并行调用。

use serde::{Deserialize, Serialize};

use crate::errors::{OutageError, OutageResult};

/// 地球平均半径（公里）
const EARTH_RADIUS_KM: f64 = 6371.0;

/// 地理坐标点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// 创建坐标点，非法坐标在进入系统前被拒绝
    pub fn new(latitude: f64, longitude: f64) -> OutageResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(OutageError::invalid_params(format!(
                "纬度超出范围: {latitude}"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(OutageError::invalid_params(format!(
                "经度超出范围: {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }
}

/// Haversine大圆距离（公里）
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_invalid_coordinates() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(-90.1, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 180.5).is_err());
        assert!(GeoPoint::new(40.7128, -74.0060).is_ok());
    }

    #[test]
    fn test_distance_zero_for_identical_points() {
        let p = GeoPoint::new(40.7589, -73.9851).unwrap();
        assert!(haversine_km(&p, &p).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = GeoPoint::new(40.7128, -74.0060).unwrap();
        let b = GeoPoint::new(34.0522, -118.2437).unwrap();
        let d1 = haversine_km(&a, &b);
        let d2 = haversine_km(&b, &a);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_nyc_to_la_distance() {
        // 纽约到洛杉矶约3936公里，允许±1%误差
        let nyc = GeoPoint::new(40.7128, -74.0060).unwrap();
        let la = GeoPoint::new(34.0522, -118.2437).unwrap();
        let d = haversine_km(&nyc, &la);
        assert!((d - 3936.0).abs() < 3936.0 * 0.01, "距离计算偏差过大: {d}");
    }
}
