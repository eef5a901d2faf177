//! 抢修班组模型
//!
//! 班组携带专业方向、技能等级、实时位置与工时信息，
//! 供调度器做可用性判定与多因素打分。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// 最大单日工时（安全规定）
pub const MAX_HOURS_PER_DAY: f64 = 16.0;
/// 单个班组同时承担的最大任务数
pub const MAX_ACTIVE_ASSIGNMENTS: usize = 2;
/// 接受新任务要求距换班至少剩余的小时数
pub const MIN_SHIFT_REMAINING_HOURS: i64 = 4;

/// 班组专业方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewSpecialization {
    LineWorker,
    TreeRemoval,
    SubstationTech,
    EmergencyResponse,
}

/// 技能等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Junior,
    Senior,
    Expert,
}

impl SkillLevel {
    /// 调度打分中的经验加成
    pub fn experience_bonus(&self) -> f64 {
        match self {
            Self::Expert => 20.0,
            Self::Senior => 10.0,
            Self::Junior => 0.0,
        }
    }
}

/// 班组实时状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewStatus {
    Available,
    Dispatched,
    OnSite,
    Returning,
    OffDuty,
}

/// 抢修班组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCrew {
    pub crew_id: String,
    pub name: String,
    pub team_size: u8,

    // 专业能力
    pub specialization: CrewSpecialization,
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,

    // 位置与可用性
    pub location: GeoPoint,
    pub status: CrewStatus,
    pub last_location_update: DateTime<Utc>,

    // 排班与工作量
    pub shift_end: DateTime<Utc>,
    #[serde(default)]
    pub current_assignments: Vec<String>,
    #[serde(default)]
    pub hours_worked_today: f64,
}

impl FieldCrew {
    /// 可用性判定
    ///
    /// 业务规则：状态为available或returning；当日工时不足16小时；
    /// 距换班超过4小时；在手任务少于2个。
    pub fn is_available_for_assignment(&self, now: DateTime<Utc>) -> bool {
        let status_ok = matches!(self.status, CrewStatus::Available | CrewStatus::Returning);
        let hours_ok = self.hours_worked_today < MAX_HOURS_PER_DAY;
        let shift_ok = self.shift_end > now + Duration::hours(MIN_SHIFT_REMAINING_HOURS);
        let load_ok = self.current_assignments.len() < MAX_ACTIVE_ASSIGNMENTS;
        status_ok && hours_ok && shift_ok && load_ok
    }

    /// 专业匹配分
    ///
    /// 完全匹配100分；线路工可承担应急响应75分；
    /// 应急响应可承担其他任意类型50分；其余交叉情况25分。
    pub fn specialization_match_score(&self, required: CrewSpecialization) -> f64 {
        if self.specialization == required {
            100.0
        } else if self.specialization == CrewSpecialization::LineWorker
            && required == CrewSpecialization::EmergencyResponse
        {
            75.0
        } else if self.specialization == CrewSpecialization::EmergencyResponse {
            50.0
        } else {
            25.0
        }
    }

    /// 预计响应时间（分钟）
    ///
    /// 市区平均60公里/小时，加15分钟出车准备，
    /// 每件专用装备再加5分钟，向上取整到15分钟边界。
    pub fn estimated_response_minutes(&self, destination: &GeoPoint) -> u32 {
        let distance_km = self.location.distance_km(destination);
        let travel_minutes = distance_km / 60.0 * 60.0;
        let prep_minutes = 15.0 + 5.0 * self.equipment.len() as f64;
        let total = travel_minutes + prep_minutes;
        ((total / 15.0).ceil() * 15.0) as u32
    }
}

/// 任务角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    Lead,
    Support,
    Specialist,
}

/// 班组-事故任务记录
///
/// 由调度器创建，进度更新时修改，事故解决时关闭。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewAssignment {
    pub assignment_id: String,
    pub crew_id: String,
    pub incident_id: String,
    pub assigned_at: DateTime<Utc>,

    pub role: AssignmentRole,
    pub estimated_arrival: DateTime<Utc>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub estimated_completion: DateTime<Utc>,
    pub actual_completion: Option<DateTime<Utc>>,

    // 进度追踪
    pub work_progress_percent: u8,
    pub status_notes: Vec<String>,
    /// 资源使用记录：资源名 -> 小时数
    pub resources_used: std::collections::HashMap<String, f64>,
}

impl CrewAssignment {
    pub fn new(
        crew_id: String,
        incident_id: String,
        role: AssignmentRole,
        estimated_arrival: DateTime<Utc>,
        estimated_completion: DateTime<Utc>,
    ) -> Self {
        Self {
            assignment_id: format!("ASSIGN_{}", &Uuid::new_v4().simple().to_string()[..6]),
            crew_id,
            incident_id,
            assigned_at: Utc::now(),
            role,
            estimated_arrival,
            actual_arrival: None,
            estimated_completion,
            actual_completion: None,
            work_progress_percent: 0,
            status_notes: Vec::new(),
            resources_used: std::collections::HashMap::new(),
        }
    }
}
