//! 恢复计划
//!
//! 将事故分解为有序的抢修任务：先评估损伤，再按"单位时间恢复
//! 客户数"降序排列维修任务，最后校验送电。进度更新以
//! (事故ID, 任务ID)为幂等键，作用于单份存储的计划。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use outage_core::models::{
    CrewAssignment, CrewSpecialization, EquipmentKind, OutageIncident,
};
use outage_core::{GridDataSource, OutageError, OutageResult};

/// 恢复任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationTask {
    pub task_id: String,
    pub description: String,
    pub required_specialization: CrewSpecialization,
    pub estimated_duration_hours: f64,
    /// 该任务完成后预计恢复供电的客户数
    pub customers_restored: u32,
    pub assigned_crew: Option<String>,
    pub progress_percent: u8,
    pub note: String,
    pub last_updated: DateTime<Utc>,
}

/// 恢复计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationPlan {
    pub incident_id: String,
    pub generated_at: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
    pub tasks: Vec<RestorationTask>,
}

/// 恢复计划服务
pub struct RestorationPlanner {
    data_source: Arc<dyn GridDataSource>,
    plans: RwLock<HashMap<String, RestorationPlan>>,
}

impl RestorationPlanner {
    pub fn new(data_source: Arc<dyn GridDataSource>) -> Self {
        Self {
            data_source,
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// 生成恢复计划
    ///
    /// 任务次序：损伤评估 -> 按恢复效率排序的设备维修 -> 送电校验。
    /// 设备记录缺失时退回默认工时估算，不中断整个计划。
    pub async fn generate_plan(
        &self,
        incident: &OutageIncident,
        assignments: &[CrewAssignment],
    ) -> OutageResult<RestorationPlan> {
        let now = Utc::now();
        let lead_crew = assignments.first().map(|a| a.crew_id.clone());
        let mut tasks = Vec::new();

        tasks.push(RestorationTask {
            task_id: "TASK_001".to_string(),
            description: "评估主故障点损伤".to_string(),
            required_specialization: CrewSpecialization::EmergencyResponse,
            estimated_duration_hours: 1.0,
            customers_restored: 0,
            assigned_crew: lead_crew.clone(),
            progress_percent: 0,
            note: String::new(),
            last_updated: now,
        });

        // 每个故障设备一项维修任务
        let mut repair_tasks = Vec::new();
        let equipment_count = incident.failed_equipment_ids.len().max(1) as u32;
        for equipment_id in &incident.failed_equipment_ids {
            let (duration, specialization, customers) =
                match self.data_source.get_equipment_by_id(equipment_id).await {
                    Ok(equipment) => {
                        let (duration, specialization) = match equipment.kind {
                            EquipmentKind::Substation { .. } => {
                                (4.0, CrewSpecialization::SubstationTech)
                            }
                            EquipmentKind::PowerLine { .. } => {
                                (3.0, CrewSpecialization::LineWorker)
                            }
                            EquipmentKind::Transformer => {
                                (2.0, CrewSpecialization::SubstationTech)
                            }
                            EquipmentKind::Pole | EquipmentKind::CircuitBreaker => {
                                (1.5, CrewSpecialization::LineWorker)
                            }
                        };
                        let customers = if equipment.customers_served > 0 {
                            equipment.customers_served
                        } else {
                            incident.estimated_customers_affected / equipment_count
                        };
                        (duration, specialization, customers)
                    }
                    Err(e) => {
                        // 单条设备记录缺失不拖垮计划生成
                        warn!(
                            equipment_id = %equipment_id,
                            error = %e,
                            "设备记录不可用，使用默认估算"
                        );
                        (
                            2.0,
                            CrewSpecialization::LineWorker,
                            incident.estimated_customers_affected / equipment_count,
                        )
                    }
                };
            repair_tasks.push((equipment_id.clone(), duration, specialization, customers));
        }

        // 优先执行单位时间恢复客户数最高的维修
        repair_tasks.sort_by(|a, b| {
            let rate_a = a.3 as f64 / a.1;
            let rate_b = b.3 as f64 / b.1;
            rate_b
                .partial_cmp(&rate_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        for (index, (equipment_id, duration, specialization, customers)) in
            repair_tasks.into_iter().enumerate()
        {
            tasks.push(RestorationTask {
                task_id: format!("TASK_{:03}", index + 2),
                description: format!("抢修故障设备 {equipment_id}"),
                required_specialization: specialization,
                estimated_duration_hours: duration,
                customers_restored: customers,
                assigned_crew: lead_crew.clone(),
                progress_percent: 0,
                note: String::new(),
                last_updated: now,
            });
        }

        tasks.push(RestorationTask {
            task_id: format!("TASK_{:03}", tasks.len() + 1),
            description: "送电校验与收尾".to_string(),
            required_specialization: CrewSpecialization::LineWorker,
            estimated_duration_hours: 0.5,
            customers_restored: 0,
            assigned_crew: lead_crew,
            progress_percent: 0,
            note: String::new(),
            last_updated: now,
        });

        let total_hours: f64 = tasks.iter().map(|t| t.estimated_duration_hours).sum();
        let plan = RestorationPlan {
            incident_id: incident.incident_id.clone(),
            generated_at: now,
            estimated_completion: now + Duration::minutes((total_hours * 60.0) as i64),
            tasks,
        };

        info!(
            incident_id = %incident.incident_id,
            tasks = plan.tasks.len(),
            total_hours,
            "恢复计划已生成"
        );

        self.plans
            .write()
            .await
            .insert(incident.incident_id.clone(), plan.clone());
        Ok(plan)
    }

    /// 查询恢复计划
    pub async fn get_plan(&self, incident_id: &str) -> Option<RestorationPlan> {
        self.plans.read().await.get(incident_id).cloned()
    }

    /// 更新任务进度
    ///
    /// 以(事故ID, 任务ID)为幂等键：重复提交同一进度是无操作的成功；
    /// 进度不允许倒退；事故没有计划时返回PlanNotFound。
    pub async fn update_task_progress(
        &self,
        incident_id: &str,
        task_id: &str,
        progress_percent: u8,
        note: &str,
    ) -> OutageResult<()> {
        if progress_percent > 100 {
            return Err(OutageError::invalid_params(format!(
                "进度百分比超出范围: {progress_percent}"
            )));
        }

        let mut plans = self.plans.write().await;
        let plan = plans
            .get_mut(incident_id)
            .ok_or_else(|| OutageError::plan_not_found(incident_id))?;

        let task = plan
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| {
                OutageError::invalid_params(format!("计划中不存在任务: {task_id}"))
            })?;

        if task.progress_percent == progress_percent {
            debug!(
                incident_id = %incident_id,
                task_id = %task_id,
                progress_percent,
                "重复的进度上报，按幂等处理"
            );
            return Ok(());
        }
        if progress_percent < task.progress_percent {
            return Err(OutageError::invalid_params(format!(
                "进度不允许倒退: {} -> {progress_percent}",
                task.progress_percent
            )));
        }

        task.progress_percent = progress_percent;
        task.note = note.to_string();
        task.last_updated = Utc::now();
        debug!(
            incident_id = %incident_id,
            task_id = %task_id,
            progress_percent,
            "任务进度已更新"
        );
        Ok(())
    }
}
