//! 运营统计
//!
//! 面向管理报表的回看窗口聚合：按起因与严重度的事故分布、
//! 平均恢复时长、客户停电分钟数（CMI）与监管上报口径。

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use outage_core::models::OutageIncident;

use crate::store::IncidentStore;

/// 超过该小时数的停电需要专项监管上报
const REGULATORY_REPORT_HOURS: f64 = 4.0;

/// 回看窗口内的运营统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutageStatistics {
    pub window_hours: i64,
    pub total_incidents: usize,
    pub active_incidents: usize,
    pub resolved_incidents: usize,
    pub incidents_by_cause: HashMap<String, usize>,
    pub incidents_by_severity: HashMap<String, usize>,
    /// 已解决事故的平均恢复时长（小时）
    pub average_restoration_hours: Option<f64>,
    /// 客户停电分钟数：Σ 受影响客户数 × 停电时长（分钟）
    pub customer_minutes_interrupted: f64,
    /// 超过4小时、需要监管上报的事故数
    pub regulatory_reportable: usize,
}

impl OutageStatistics {
    /// 对事故存储计算回看窗口内的统计
    pub async fn compute(store: &IncidentStore, hours_back: i64) -> Self {
        let now = Utc::now();
        let cutoff = now - Duration::hours(hours_back);

        let mut incidents = store.history_snapshot().await;
        let active = store.active_snapshot().await;
        let active_count = active
            .iter()
            .filter(|i| i.created_at >= cutoff)
            .count();
        incidents.extend(active);
        incidents.retain(|i| i.created_at >= cutoff);

        Self::from_incidents(&incidents, hours_back, active_count, now)
    }

    fn from_incidents(
        incidents: &[OutageIncident],
        window_hours: i64,
        active_incidents: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut by_cause: HashMap<String, usize> = HashMap::new();
        let mut by_severity: HashMap<String, usize> = HashMap::new();
        let mut restoration_hours = Vec::new();
        let mut cmi = 0.0;
        let mut reportable = 0;

        for incident in incidents {
            *by_cause
                .entry(format!("{:?}", incident.cause))
                .or_default() += 1;
            *by_severity
                .entry(format!("{:?}", incident.severity))
                .or_default() += 1;

            let duration_minutes = incident.outage_duration_minutes(now);
            cmi += incident.estimated_customers_affected as f64 * duration_minutes;
            if duration_minutes / 60.0 > REGULATORY_REPORT_HOURS {
                reportable += 1;
            }
            if incident.actual_restoration_time.is_some() {
                restoration_hours.push(duration_minutes / 60.0);
            }
        }

        let average_restoration_hours = if restoration_hours.is_empty() {
            None
        } else {
            Some(restoration_hours.iter().sum::<f64>() / restoration_hours.len() as f64)
        };

        Self {
            window_hours,
            total_incidents: incidents.len(),
            active_incidents,
            resolved_incidents: incidents.len() - active_incidents,
            incidents_by_cause: by_cause,
            incidents_by_severity: by_severity,
            average_restoration_hours,
            customer_minutes_interrupted: cmi,
            regulatory_reportable: reportable,
        }
    }
}
