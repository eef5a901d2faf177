//! 通知调度策略
//!
//! 按客户分级决定通知渠道与时限，以及进度更新节奏与夜间静默规则。
//! 静默时段来自配置，这里只保存默认值。

use chrono::{DateTime, Timelike, Utc};

use outage_core::config::NotifierConfig;
use outage_core::models::{Channel, Customer, CustomerType};

/// 默认夜间静默起始时刻（22:00）
pub const DEFAULT_QUIET_START_HOUR: u32 = 22;
/// 默认夜间静默结束时刻（06:00）
pub const DEFAULT_QUIET_END_HOUR: u32 = 6;

/// 各分级的通知渠道
///
/// 关键基础设施走电话；工商客户短信加邮件；居民客户只发短信。
pub fn channels_for_tier(customer_type: CustomerType) -> Vec<Channel> {
    match customer_type {
        CustomerType::CriticalInfrastructure => vec![Channel::Phone],
        CustomerType::Commercial => vec![Channel::Sms, Channel::Email],
        CustomerType::Residential => vec![Channel::Sms],
    }
}

/// 各分级的最大通知延迟（分钟）
pub fn max_delay_minutes(customer_type: CustomerType) -> u32 {
    match customer_type {
        CustomerType::CriticalInfrastructure => 5,
        CustomerType::Commercial => 15,
        CustomerType::Residential => 30,
    }
}

/// 进度更新间隔（小时）：关键基础设施1小时，其余2小时
pub fn update_interval_hours(customer_type: CustomerType) -> u32 {
    match customer_type {
        CustomerType::CriticalInfrastructure => 1,
        _ => 2,
    }
}

/// 夜间静默策略
///
/// 静默窗口按配置的起止时刻判定，支持跨午夜窗口。
#[derive(Debug, Clone, Copy)]
pub struct NotificationPolicy {
    quiet_start_hour: u32,
    quiet_end_hour: u32,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            quiet_start_hour: DEFAULT_QUIET_START_HOUR,
            quiet_end_hour: DEFAULT_QUIET_END_HOUR,
        }
    }
}

impl NotificationPolicy {
    pub fn new(quiet_start_hour: u32, quiet_end_hour: u32) -> Self {
        Self {
            quiet_start_hour,
            quiet_end_hour,
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(config.quiet_start_hour, config.quiet_end_hour)
    }

    /// 是否处于夜间静默时段
    pub fn within_quiet_hours(&self, at: DateTime<Utc>) -> bool {
        let hour = at.hour();
        if self.quiet_start_hour <= self.quiet_end_hour {
            hour >= self.quiet_start_hour && hour < self.quiet_end_hour
        } else {
            hour >= self.quiet_start_hour || hour < self.quiet_end_hour
        }
    }

    /// 此刻是否应向该客户推送进度更新
    ///
    /// 静默时段内只有关键基础设施客户仍然接收更新。
    pub fn should_send_progress_update(&self, customer: &Customer, at: DateTime<Utc>) -> bool {
        if self.within_quiet_hours(at) {
            return customer.is_critical_infrastructure();
        }
        true
    }
}
