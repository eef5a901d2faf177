//! 事故存储与生命周期状态机
//!
//! 每个事故由独立的互斥锁保护，状态转换与派单在单个事故上串行化。
//! 到达终态resolved后事故从活跃表迁入历史表。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info};

use outage_core::models::{
    IncidentStatus, OutageCause, OutageIncident, OutageSeverity, TimelineEntry,
};
use outage_core::{GeoPoint, GridDataSource, OutageError, OutageResult};

use crate::priority::priority_score;

/// 状态转换事件，用于触发通知调度
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub incident: OutageIncident,
    pub from_status: IncidentStatus,
    pub to_status: IncidentStatus,
    pub crew_id: Option<String>,
    pub note: String,
}

type IncidentSlot = Arc<Mutex<OutageIncident>>;

/// 事故存储
pub struct IncidentStore {
    data_source: Arc<dyn GridDataSource>,
    active: RwLock<HashMap<String, IncidentSlot>>,
    history: RwLock<Vec<OutageIncident>>,
    events: broadcast::Sender<TransitionEvent>,
}

impl IncidentStore {
    pub fn new(data_source: Arc<dyn GridDataSource>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            data_source,
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            events,
        }
    }

    /// 订阅状态转换事件（尽力投递，不与转换本身构成事务）
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }

    /// 由设备故障创建事故
    ///
    /// 解析故障设备 -> 按影响半径查询受影响客户 -> 按类型汇总 ->
    /// 评估严重度与恢复时长 -> 以reported状态入库。
    pub async fn create_incident_from_equipment_failure(
        &self,
        failed_equipment_id: &str,
        cause: OutageCause,
        location: GeoPoint,
        affected_radius_km: f64,
    ) -> OutageResult<String> {
        let equipment = self
            .data_source
            .get_equipment_by_id(failed_equipment_id)
            .await?;

        let customers = self
            .data_source
            .get_customers_in_area(location, affected_radius_km)
            .await?;

        let mut critical = 0u32;
        let mut commercial = 0u32;
        let mut residential = 0u32;
        for customer in &customers {
            match customer.customer_type {
                outage_core::models::CustomerType::CriticalInfrastructure => critical += 1,
                outage_core::models::CustomerType::Commercial => commercial += 1,
                outage_core::models::CustomerType::Residential => residential += 1,
            }
        }

        // 设备服务客户数与区域查询结果取较大者作为影响估计
        let total_in_area = critical + commercial + residential;
        let estimated_affected = equipment.customers_served.max(total_in_area).max(1);

        let failed_ids = vec![failed_equipment_id.to_string()];
        let estimated_hours = estimate_restoration_hours(
            assess_severity(critical, estimated_affected, &failed_ids, None),
            estimated_affected,
            0,
        );
        let severity = assess_severity(
            critical,
            estimated_affected,
            &failed_ids,
            Some(estimated_hours),
        );

        let incident = OutageIncident::new(
            location,
            affected_radius_km,
            cause,
            severity,
            failed_ids,
            estimated_affected,
            critical,
            commercial,
            residential,
            estimated_hours,
        )?;

        let incident_id = incident.incident_id.clone();
        info!(
            incident_id = %incident_id,
            equipment_id = %failed_equipment_id,
            affected = estimated_affected,
            severity = ?severity,
            "创建停电事故"
        );

        self.active
            .write()
            .await
            .insert(incident_id.clone(), Arc::new(Mutex::new(incident)));
        Ok(incident_id)
    }

    /// 直接插入已构造好的事故（测试与演练场景）
    pub async fn insert(&self, incident: OutageIncident) -> String {
        let id = incident.incident_id.clone();
        self.active
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(incident)));
        id
    }

    /// 状态转换
    ///
    /// 只允许线性前进；守卫条件：
    /// - confirmed -> assigned 需要非空班组引用
    /// - assigned -> in_progress 需要被指派班组到场上报
    /// - in_progress -> resolved 需要全部客户恢复供电
    ///
    /// 违例返回InvalidTransition且状态保持不变。
    /// 成功时追加时间线条目并广播转换事件。
    pub async fn update_status(
        &self,
        incident_id: &str,
        new_status: IncidentStatus,
        crew_id: Option<&str>,
        note: &str,
    ) -> OutageResult<OutageIncident> {
        let slot = self.get_slot(incident_id).await?;
        let mut incident = slot.lock().await;
        let from_status = incident.status;

        if !from_status.can_transition_to(new_status) {
            debug!(
                incident_id = %incident_id,
                from = ?from_status,
                to = ?new_status,
                "拒绝非法状态转换"
            );
            return Err(OutageError::InvalidTransition {
                from: from_status,
                to: new_status,
            });
        }

        match new_status {
            IncidentStatus::Assigned => {
                let crew = crew_id.filter(|c| !c.is_empty()).ok_or_else(|| {
                    OutageError::invalid_params("进入assigned状态需要指定班组")
                })?;
                if !incident.assigned_crew_ids.iter().any(|c| c == crew) {
                    incident.assigned_crew_ids.push(crew.to_string());
                }
            }
            IncidentStatus::InProgress => {
                let crew = crew_id.ok_or_else(|| {
                    OutageError::invalid_params("进入in_progress状态需要班组到场上报")
                })?;
                if !incident.assigned_crew_ids.iter().any(|c| c == crew) {
                    return Err(OutageError::invalid_params(format!(
                        "班组 {crew} 未被指派到事故 {incident_id}"
                    )));
                }
            }
            IncidentStatus::Resolved => {
                if !incident.all_customers_restored() {
                    return Err(OutageError::invalid_params(format!(
                        "尚有客户未恢复供电: {}/{}",
                        incident.customers_restored, incident.estimated_customers_affected
                    )));
                }
                incident.actual_restoration_time = Some(Utc::now());
            }
            _ => {}
        }

        let now = Utc::now();
        incident.status = new_status;
        incident.last_status_update = now;
        incident.timeline.push(TimelineEntry {
            timestamp: now,
            from_status,
            to_status: new_status,
            crew_id: crew_id.map(str::to_string),
            note: note.to_string(),
        });

        info!(
            incident_id = %incident_id,
            from = ?from_status,
            to = ?new_status,
            crew = ?crew_id,
            "事故状态转换"
        );

        let snapshot = incident.clone();
        drop(incident);

        // 终态事故迁入历史表
        if new_status.is_terminal() {
            self.active.write().await.remove(incident_id);
            self.history.write().await.push(snapshot.clone());
            debug!(incident_id = %incident_id, "事故已迁入历史");
        }

        // 尽力广播，没有订阅者不算失败
        let _ = self.events.send(TransitionEvent {
            incident: snapshot.clone(),
            from_status,
            to_status: new_status,
            crew_id: crew_id.map(str::to_string),
            note: note.to_string(),
        });

        Ok(snapshot)
    }

    /// 记录已恢复供电的客户数（resolved守卫的依据）
    pub async fn record_customers_restored(
        &self,
        incident_id: &str,
        restored: u32,
    ) -> OutageResult<()> {
        let slot = self.get_slot(incident_id).await?;
        let mut incident = slot.lock().await;
        incident.customers_restored = restored.min(incident.estimated_customers_affected);
        Ok(())
    }

    /// 获取事故快照
    pub async fn snapshot(&self, incident_id: &str) -> OutageResult<OutageIncident> {
        let slot = self.get_slot(incident_id).await?;
        let incident = slot.lock().await;
        Ok(incident.clone())
    }

    /// 按优先级降序列出活跃事故（默认排除resolved）
    pub async fn incidents_by_priority(
        &self,
        now: DateTime<Utc>,
        status_filter: Option<&[IncidentStatus]>,
    ) -> Vec<(OutageIncident, f64)> {
        let slots: Vec<IncidentSlot> = self.active.read().await.values().cloned().collect();
        let mut scored = Vec::with_capacity(slots.len());
        for slot in slots {
            let incident = slot.lock().await.clone();
            if let Some(filter) = status_filter {
                if !filter.contains(&incident.status) {
                    continue;
                }
            }
            let score = priority_score(&incident, now);
            scored.push((incident, score));
        }
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.incident_id.cmp(&b.0.incident_id))
        });
        scored
    }

    /// 活跃事故数
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// 历史事故快照（只读，供报表使用）
    pub async fn history_snapshot(&self) -> Vec<OutageIncident> {
        self.history.read().await.clone()
    }

    /// 活跃事故快照（只读，供报表使用）
    pub async fn active_snapshot(&self) -> Vec<OutageIncident> {
        let slots: Vec<IncidentSlot> = self.active.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.lock().await.clone());
        }
        out
    }

    async fn get_slot(&self, incident_id: &str) -> OutageResult<IncidentSlot> {
        self.active
            .read()
            .await
            .get(incident_id)
            .cloned()
            .ok_or_else(|| OutageError::incident_not_found(incident_id))
    }
}

/// 严重度评估
///
/// 存在关键基础设施客户时强制不低于critical；否则按总影响客户数
/// 分档（<100 minor，100-500 moderate，500-2000 major，>2000 critical）。
/// catastrophic保留给多设备故障或恢复估算超过24小时的事故。
pub fn assess_severity(
    critical_infrastructure_count: u32,
    total_affected: u32,
    failed_equipment_ids: &[String],
    estimated_restoration_hours: Option<f64>,
) -> OutageSeverity {
    let multi_equipment = failed_equipment_ids.len() > 1;
    let long_restoration = estimated_restoration_hours.is_some_and(|h| h > 24.0);
    if multi_equipment || long_restoration {
        return OutageSeverity::Catastrophic;
    }

    let by_count = if total_affected > 2000 {
        OutageSeverity::Critical
    } else if total_affected > 500 {
        OutageSeverity::Major
    } else if total_affected >= 100 {
        OutageSeverity::Moderate
    } else {
        OutageSeverity::Minor
    };

    if critical_infrastructure_count > 0 {
        by_count.max(OutageSeverity::Critical)
    } else {
        by_count
    }
}

/// 恢复时长估算（小时）
///
/// 严重度基准时长，加每100客户1小时，每个参与班组减10%（最多5个），
/// 下限半小时。
pub fn estimate_restoration_hours(
    severity: OutageSeverity,
    affected_customers: u32,
    crew_count: usize,
) -> f64 {
    let mut hours = severity.base_restoration_hours();
    hours += affected_customers as f64 / 100.0;
    let reduction = (crew_count.min(5)) as f64 * 0.10;
    hours *= 1.0 - reduction;
    hours.max(0.5)
}
