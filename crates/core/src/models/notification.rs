//! 客户通知投递记录
//!
//! 每次投递尝试（成功、失败、取消）都追加进只增的审计日志。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::customer::{Channel, CustomerPriority};

/// 投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
    Cancelled,
}

/// 通知投递记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub customer_id: String,
    pub incident_id: String,
    pub channel: Channel,
    pub message: String,
    pub priority: CustomerPriority,
    pub scheduled_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub outcome: DeliveryOutcome,
    pub attempt_count: u8,
}
