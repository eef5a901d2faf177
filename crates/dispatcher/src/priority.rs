//! 事故优先级打分
//!
//! 打分是(事故快照, 评估时刻)的纯函数。时长项依赖墙钟时间，
//! 因此每次读取都重新计算，从不缓存。

use chrono::{DateTime, Utc};

use outage_core::models::{OutageCause, OutageIncident};

/// 恶劣天气事故的整体加权倍数
const SEVERE_WEATHER_MULTIPLIER: f64 = 1.5;
/// 每小时等待的紧迫度加分
const HOURS_PENALTY_PER_HOUR: f64 = 20.0;

/// 计算事故优先级分数（越高越紧急）
///
/// 业务规则：
/// - 关键基础设施客户每个100分，工商客户10分，居民客户1分
/// - 乘以严重度倍数（minor=1 / moderate=2 / major=3 / critical=5 / catastrophic=10）
/// - 加每小时20分的等待时长项
/// - 起因为恶劣天气时整体乘以1.5
pub fn priority_score(incident: &OutageIncident, now: DateTime<Utc>) -> f64 {
    let base = incident.critical_infrastructure_count as f64 * 100.0
        + incident.commercial_customer_count as f64 * 10.0
        + incident.residential_customer_count as f64;

    let mut score = base * incident.severity.priority_multiplier();
    score += incident.hours_since_creation(now).max(0.0) * HOURS_PENALTY_PER_HOUR;

    if incident.cause == OutageCause::SevereWeather {
        score *= SEVERE_WEATHER_MULTIPLIER;
    }

    score
}
