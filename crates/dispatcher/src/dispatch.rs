//! 班组调度
//!
//! 维护班组注册表，执行可用性过滤、多因素打分与最优匹配，
//! 并以原子的查验-预订创建任务。两起事故争抢同一班组时，
//! 失败方观察到班组不再可用并回退到次优候选。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use outage_core::models::{
    AssignmentRole, CrewAssignment, CrewSpecialization, CrewStatus, FieldCrew, IncidentStatus,
    OutageCause, OutageIncident,
};
use outage_core::{OutageError, OutageResult};

use crate::store::IncidentStore;

/// 客户影响加分的上限
const CUSTOMER_BONUS_CAP: f64 = 500.0;
/// 每公里距离的扣分
const DISTANCE_PENALTY_PER_KM: f64 = 2.0;

/// 单个班组的打分明细
#[derive(Debug, Clone, PartialEq)]
pub struct CrewScore {
    pub crew_id: String,
    pub specialization_score: f64,
    pub distance_km: f64,
    pub distance_penalty: f64,
    pub experience_bonus: f64,
    pub customer_bonus: f64,
    pub total: f64,
}

/// 最优匹配推荐
#[derive(Debug, Clone)]
pub struct CrewRecommendation {
    pub crew_id: String,
    pub score: CrewScore,
    pub estimated_arrival_minutes: u32,
}

/// 班组注册表
///
/// 查验-预订在同一把锁下完成，跨事故的并发预订不会超售。
pub struct CrewRegistry {
    crews: Mutex<HashMap<String, FieldCrew>>,
}

impl CrewRegistry {
    pub fn new() -> Self {
        Self {
            crews: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(&self, crews: Vec<FieldCrew>) {
        let mut guard = self.crews.lock().await;
        for crew in crews {
            guard.insert(crew.crew_id.clone(), crew);
        }
    }

    /// 全量快照（打分用，纯读）
    pub async fn snapshot(&self) -> Vec<FieldCrew> {
        self.crews.lock().await.values().cloned().collect()
    }

    pub async fn get(&self, crew_id: &str) -> OutageResult<FieldCrew> {
        self.crews
            .lock()
            .await
            .get(crew_id)
            .cloned()
            .ok_or_else(|| OutageError::crew_not_found(crew_id))
    }

    /// 原子的查验-预订
    ///
    /// 锁内重新校验可用性后才写入，失败时班组状态不变。
    pub async fn try_book(
        &self,
        crew_id: &str,
        incident_id: &str,
        now: DateTime<Utc>,
    ) -> OutageResult<FieldCrew> {
        let mut guard = self.crews.lock().await;
        let crew = guard
            .get_mut(crew_id)
            .ok_or_else(|| OutageError::crew_not_found(crew_id))?;

        if !crew.is_available_for_assignment(now) {
            return Err(OutageError::crew_unavailable(crew_id));
        }

        crew.current_assignments.push(incident_id.to_string());
        crew.status = CrewStatus::Dispatched;
        Ok(crew.clone())
    }

    /// 撤销预订，恢复班组到预订前的可派状态
    ///
    /// 与release不同：不累计工时，派单失败的回滚路径专用。
    pub async fn cancel_booking(&self, crew_id: &str, incident_id: &str) -> OutageResult<()> {
        let mut guard = self.crews.lock().await;
        let crew = guard
            .get_mut(crew_id)
            .ok_or_else(|| OutageError::crew_not_found(crew_id))?;

        crew.current_assignments.retain(|id| id != incident_id);
        if crew.current_assignments.is_empty() && crew.status == CrewStatus::Dispatched {
            crew.status = CrewStatus::Available;
        }
        Ok(())
    }

    /// 解除预订；无在手任务时转为returning
    pub async fn release(
        &self,
        crew_id: &str,
        incident_id: &str,
        hours_worked: f64,
    ) -> OutageResult<()> {
        let mut guard = self.crews.lock().await;
        let crew = guard
            .get_mut(crew_id)
            .ok_or_else(|| OutageError::crew_not_found(crew_id))?;

        crew.current_assignments.retain(|id| id != incident_id);
        crew.hours_worked_today += hours_worked;
        if crew.current_assignments.is_empty() {
            crew.status = CrewStatus::Returning;
        }
        Ok(())
    }

    /// 班组到场上报
    pub async fn report_on_site(&self, crew_id: &str) -> OutageResult<()> {
        let mut guard = self.crews.lock().await;
        let crew = guard
            .get_mut(crew_id)
            .ok_or_else(|| OutageError::crew_not_found(crew_id))?;
        crew.status = CrewStatus::OnSite;
        Ok(())
    }
}

impl Default for CrewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 班组调度器
pub struct CrewDispatcher {
    registry: Arc<CrewRegistry>,
    store: Arc<IncidentStore>,
    active_assignments: Mutex<HashMap<String, CrewAssignment>>,
    assignment_history: Mutex<Vec<CrewAssignment>>,
}

impl CrewDispatcher {
    pub fn new(registry: Arc<CrewRegistry>, store: Arc<IncidentStore>) -> Self {
        Self {
            registry,
            store,
            active_assignments: Mutex::new(HashMap::new()),
            assignment_history: Mutex::new(Vec::new()),
        }
    }

    /// 事故所需的专业方向
    pub fn required_specialization(incident: &OutageIncident) -> CrewSpecialization {
        match incident.cause {
            OutageCause::EquipmentFailure => CrewSpecialization::SubstationTech,
            OutageCause::Vegetation => CrewSpecialization::TreeRemoval,
            OutageCause::SevereWeather | OutageCause::VehicleAccident => {
                CrewSpecialization::EmergencyResponse
            }
            OutageCause::AnimalContact | OutageCause::PlannedMaintenance => {
                CrewSpecialization::LineWorker
            }
        }
    }

    /// 对单个班组打分
    ///
    /// 总分 = 专业匹配分 - 2×距离公里数 + 经验加成 + 客户影响加分（上限500）。
    /// 纯函数，可跨全体班组并行计算。
    pub fn score_crew(crew: &FieldCrew, incident: &OutageIncident) -> CrewScore {
        let required = Self::required_specialization(incident);
        let specialization_score = crew.specialization_match_score(required);
        let distance_km = crew.location.distance_km(&incident.location);
        let distance_penalty = -DISTANCE_PENALTY_PER_KM * distance_km;
        let experience_bonus = crew.skill_level.experience_bonus();
        let customer_bonus =
            (incident.estimated_customers_affected as f64).min(CUSTOMER_BONUS_CAP);

        CrewScore {
            crew_id: crew.crew_id.clone(),
            specialization_score,
            distance_km,
            distance_penalty,
            experience_bonus,
            customer_bonus,
            total: specialization_score + distance_penalty + experience_bonus + customer_bonus,
        }
    }

    /// 按总分降序排出候选名单，同分按班组ID字典序
    pub async fn rank_candidates(
        &self,
        incident: &OutageIncident,
        now: DateTime<Utc>,
    ) -> Vec<CrewScore> {
        let crews = self.registry.snapshot().await;
        let mut scored: Vec<CrewScore> = crews
            .iter()
            .filter(|crew| crew.is_available_for_assignment(now))
            .map(|crew| Self::score_crew(crew, incident))
            .collect();
        scored.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.crew_id.cmp(&b.crew_id))
        });
        scored
    }

    /// 最优匹配
    ///
    /// 没有可用班组时返回None而非错误。
    pub async fn find_optimal_crew(
        &self,
        incident: &OutageIncident,
        now: DateTime<Utc>,
    ) -> OutageResult<Option<CrewRecommendation>> {
        let ranked = self.rank_candidates(incident, now).await;
        let Some(best) = ranked.into_iter().next() else {
            debug!(incident_id = %incident.incident_id, "没有可用班组");
            return Ok(None);
        };

        let crew = self.registry.get(&best.crew_id).await?;
        let eta = crew.estimated_response_minutes(&incident.location);
        debug!(
            incident_id = %incident.incident_id,
            crew_id = %best.crew_id,
            total = best.total,
            eta_minutes = eta,
            "选出最优班组"
        );
        Ok(Some(CrewRecommendation {
            crew_id: best.crew_id.clone(),
            score: best,
            estimated_arrival_minutes: eta,
        }))
    }

    /// 正式派单
    ///
    /// 校验事故处于reported/confirmed -> 原子预订班组 -> 计算到达与完工
    /// 估算 -> 创建任务记录 -> 事故推进到assigned。
    pub async fn assign_crew(
        &self,
        crew_id: &str,
        incident_id: &str,
        estimated_duration_hours: f64,
    ) -> OutageResult<CrewAssignment> {
        let incident = self.store.snapshot(incident_id).await?;
        if !matches!(
            incident.status,
            IncidentStatus::Reported | IncidentStatus::Confirmed
        ) {
            return Err(OutageError::InvalidTransition {
                from: incident.status,
                to: IncidentStatus::Assigned,
            });
        }

        let now = Utc::now();
        let crew = self.registry.try_book(crew_id, incident_id, now).await?;

        let eta_minutes = crew.estimated_response_minutes(&incident.location);
        let estimated_arrival = now + Duration::minutes(eta_minutes as i64);
        let estimated_completion = estimated_arrival
            + Duration::minutes((estimated_duration_hours * 60.0).round() as i64);

        let assignment = CrewAssignment::new(
            crew_id.to_string(),
            incident_id.to_string(),
            AssignmentRole::Lead,
            estimated_arrival,
            estimated_completion,
        );

        // reported事故先确认再指派；预订后任一转换失败都必须撤销预订，
        // 否则并发竞争的失败方会把班组永久留在dispatched状态
        let transition = async {
            if incident.status == IncidentStatus::Reported {
                self.store
                    .update_status(incident_id, IncidentStatus::Confirmed, None, "事故确认")
                    .await?;
            }
            self.store
                .update_status(
                    incident_id,
                    IncidentStatus::Assigned,
                    Some(crew_id),
                    "班组已派出",
                )
                .await?;
            Ok::<(), OutageError>(())
        };
        if let Err(e) = transition.await {
            if let Err(rollback_err) = self.registry.cancel_booking(crew_id, incident_id).await {
                warn!(
                    crew_id = %crew_id,
                    incident_id = %incident_id,
                    error = %rollback_err,
                    "撤销班组预订失败"
                );
            }
            return Err(e);
        }

        info!(
            incident_id = %incident_id,
            crew_id = %crew_id,
            assignment_id = %assignment.assignment_id,
            eta_minutes,
            "派单完成"
        );

        self.active_assignments
            .lock()
            .await
            .insert(assignment.assignment_id.clone(), assignment.clone());
        Ok(assignment)
    }

    /// 为事故自动选派最优班组
    ///
    /// 推荐与预订之间可能被并发抢占，抢占失败时回退到次优候选。
    pub async fn dispatch_best(
        &self,
        incident_id: &str,
        estimated_duration_hours: f64,
    ) -> OutageResult<Option<CrewAssignment>> {
        let incident = self.store.snapshot(incident_id).await?;
        let ranked = self.rank_candidates(&incident, Utc::now()).await;

        for candidate in ranked {
            match self
                .assign_crew(&candidate.crew_id, incident_id, estimated_duration_hours)
                .await
            {
                Ok(assignment) => return Ok(Some(assignment)),
                Err(OutageError::CrewUnavailable { id }) => {
                    warn!(
                        incident_id = %incident_id,
                        crew_id = %id,
                        "班组被并发抢占，回退到下一候选"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// 班组到场：注册表状态更新并推进事故到in_progress
    pub async fn crew_arrived(&self, crew_id: &str, incident_id: &str) -> OutageResult<()> {
        self.registry.report_on_site(crew_id).await?;
        let now = Utc::now();
        let mut assignments = self.active_assignments.lock().await;
        for assignment in assignments.values_mut() {
            if assignment.incident_id == incident_id && assignment.crew_id == crew_id {
                assignment.actual_arrival = Some(now);
            }
        }
        drop(assignments);
        self.store
            .update_status(
                incident_id,
                IncidentStatus::InProgress,
                Some(crew_id),
                "班组到场，开始抢修",
            )
            .await?;
        Ok(())
    }

    /// 更新任务进度
    pub async fn update_assignment_progress(
        &self,
        assignment_id: &str,
        progress_percent: u8,
        note: &str,
    ) -> OutageResult<()> {
        if progress_percent > 100 {
            return Err(OutageError::invalid_params(format!(
                "进度百分比超出范围: {progress_percent}"
            )));
        }
        let mut assignments = self.active_assignments.lock().await;
        let assignment = assignments.get_mut(assignment_id).ok_or_else(|| {
            OutageError::invalid_params(format!("任务不存在: {assignment_id}"))
        })?;
        assignment.work_progress_percent = progress_percent;
        if !note.is_empty() {
            assignment.status_notes.push(note.to_string());
        }
        Ok(())
    }

    /// 事故解决时关闭任务并释放班组
    pub async fn close_assignments_for_incident(
        &self,
        incident_id: &str,
        now: DateTime<Utc>,
    ) -> OutageResult<Vec<CrewAssignment>> {
        let mut assignments = self.active_assignments.lock().await;
        let ids: Vec<String> = assignments
            .values()
            .filter(|a| a.incident_id == incident_id)
            .map(|a| a.assignment_id.clone())
            .collect();

        let mut closed = Vec::new();
        for id in ids {
            if let Some(mut assignment) = assignments.remove(&id) {
                assignment.work_progress_percent = 100;
                assignment.actual_completion = Some(now);
                let worked_hours =
                    (now - assignment.assigned_at).num_seconds().max(0) as f64 / 3600.0;
                self.registry
                    .release(&assignment.crew_id, incident_id, worked_hours)
                    .await?;
                closed.push(assignment);
            }
        }
        drop(assignments);

        let mut history = self.assignment_history.lock().await;
        history.extend(closed.iter().cloned());
        info!(incident_id = %incident_id, closed = closed.len(), "任务已关闭");
        Ok(closed)
    }

    /// 当前活跃任务快照
    pub async fn active_assignments(&self) -> Vec<CrewAssignment> {
        self.active_assignments.lock().await.values().cloned().collect()
    }

    /// 指定事故的活跃任务
    pub async fn assignments_for_incident(&self, incident_id: &str) -> Vec<CrewAssignment> {
        self.active_assignments
            .lock()
            .await
            .values()
            .filter(|a| a.incident_id == incident_id)
            .cloned()
            .collect()
    }
}
