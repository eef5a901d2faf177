//! 停电事故模型
//!
//! 事故记录携带完整的生命周期追踪信息：地理影响范围、起因分类、
//! 严重度评估、状态机以及只追加的时间线审计记录。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{OutageError, OutageResult};
use crate::geo::GeoPoint;

/// 停电起因分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageCause {
    EquipmentFailure,
    SevereWeather,
    VehicleAccident,
    Vegetation,
    AnimalContact,
    PlannedMaintenance,
}

impl OutageCause {
    /// 面向客户的通俗描述，用于通知消息模板
    pub fn friendly_text(&self) -> &'static str {
        match self {
            Self::EquipmentFailure => "equipment malfunction",
            Self::SevereWeather => "severe weather conditions",
            Self::VehicleAccident => "vehicle incident",
            Self::Vegetation => "tree/vegetation contact",
            Self::AnimalContact => "wildlife interference",
            Self::PlannedMaintenance => "planned maintenance work",
        }
    }
}

/// 事故严重度，按客户影响规模递增排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageSeverity {
    Minor,
    Moderate,
    Major,
    Critical,
    Catastrophic,
}

impl OutageSeverity {
    /// 优先级打分使用的严重度倍数
    pub fn priority_multiplier(&self) -> f64 {
        match self {
            Self::Minor => 1.0,
            Self::Moderate => 2.0,
            Self::Major => 3.0,
            Self::Critical => 5.0,
            Self::Catastrophic => 10.0,
        }
    }

    /// 恢复时长估算的基准小时数
    pub fn base_restoration_hours(&self) -> f64 {
        match self {
            Self::Minor => 2.0,
            Self::Moderate => 4.0,
            Self::Major => 8.0,
            Self::Critical => 12.0,
            Self::Catastrophic => 24.0,
        }
    }
}

/// 事故生命周期状态，线性推进且不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Reported,
    Confirmed,
    Assigned,
    InProgress,
    Resolved,
}

impl IncidentStatus {
    /// 状态机中的下一个合法状态
    pub fn next(&self) -> Option<IncidentStatus> {
        match self {
            Self::Reported => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Assigned),
            Self::Assigned => Some(Self::InProgress),
            Self::InProgress => Some(Self::Resolved),
            Self::Resolved => None,
        }
    }

    /// 是否允许从当前状态转换到目标状态
    pub fn can_transition_to(&self, target: IncidentStatus) -> bool {
        self.next() == Some(target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }
}

/// 时间线条目，只追加的审计记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub from_status: IncidentStatus,
    pub to_status: IncidentStatus,
    pub crew_id: Option<String>,
    pub note: String,
}

/// 停电事故记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageIncident {
    pub incident_id: String,
    pub created_at: DateTime<Utc>,

    // 地理影响范围
    pub location: GeoPoint,
    pub affected_radius_km: f64,

    // 分类与严重度
    pub cause: OutageCause,
    pub severity: OutageSeverity,
    pub status: IncidentStatus,

    // 设备与基础设施
    pub failed_equipment_ids: Vec<String>,
    pub backup_power_available: bool,

    // 客户影响统计
    pub estimated_customers_affected: u32,
    pub critical_infrastructure_count: u32,
    pub commercial_customer_count: u32,
    pub residential_customer_count: u32,
    /// 已恢复供电的客户数，决定能否进入resolved状态
    pub customers_restored: u32,

    // 时间线与估算
    pub estimated_restoration_hours: f64,
    pub actual_restoration_time: Option<DateTime<Utc>>,
    pub last_status_update: DateTime<Utc>,
    pub assigned_crew_ids: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
}

impl OutageIncident {
    /// 创建新事故记录，非法数据在进入存储前被拒绝
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        location: GeoPoint,
        affected_radius_km: f64,
        cause: OutageCause,
        severity: OutageSeverity,
        failed_equipment_ids: Vec<String>,
        estimated_customers_affected: u32,
        critical_infrastructure_count: u32,
        commercial_customer_count: u32,
        residential_customer_count: u32,
        estimated_restoration_hours: f64,
    ) -> OutageResult<Self> {
        if affected_radius_km <= 0.0 {
            return Err(OutageError::invalid_params(format!(
                "影响半径必须为正数: {affected_radius_km}"
            )));
        }
        if estimated_customers_affected == 0 {
            return Err(OutageError::invalid_params(
                "受影响客户数必须为正数".to_string(),
            ));
        }
        if estimated_restoration_hours <= 0.0 {
            return Err(OutageError::invalid_params(format!(
                "恢复时长估算必须为正数: {estimated_restoration_hours}"
            )));
        }

        let now = Utc::now();
        Ok(Self {
            incident_id: format!("INC_{}", &Uuid::new_v4().simple().to_string()[..8]),
            created_at: now,
            location,
            affected_radius_km,
            cause,
            severity,
            status: IncidentStatus::Reported,
            failed_equipment_ids,
            backup_power_available: false,
            estimated_customers_affected,
            critical_infrastructure_count,
            commercial_customer_count,
            residential_customer_count,
            customers_restored: 0,
            estimated_restoration_hours,
            actual_restoration_time: None,
            last_status_update: now,
            assigned_crew_ids: Vec::new(),
            timeline: Vec::new(),
        })
    }

    /// 所有受影响客户是否已恢复供电
    pub fn all_customers_restored(&self) -> bool {
        self.customers_restored >= self.estimated_customers_affected
    }

    /// 事故创建至今的小时数
    pub fn hours_since_creation(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 3600.0
    }

    /// 停电持续时长（分钟）：已解决取实际恢复时刻，否则取当前时刻
    pub fn outage_duration_minutes(&self, now: DateTime<Utc>) -> f64 {
        let end = self.actual_restoration_time.unwrap_or(now);
        ((end - self.created_at).num_seconds() as f64 / 60.0).max(0.0)
    }
}
