//! 投递仿真
//!
//! 按渠道成功率与延迟窗口模拟消息投递。critical优先级消息
//! 最多尝试3次，其余1次。RNG可注入种子以便测试确定性。

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use outage_core::models::{Channel, CustomerPriority, DeliveryOutcome};

/// critical优先级消息的投递尝试预算
const CRITICAL_ATTEMPT_BUDGET: u8 = 3;

/// 投递仿真参数
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub sms_success_rate: f64,
    pub email_success_rate: f64,
    pub phone_success_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sms_success_rate: 0.95,
            email_success_rate: 0.98,
            phone_success_rate: 0.85,
        }
    }
}

/// 单次投递的仿真结果
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub outcome: DeliveryOutcome,
    pub delivered_at: Option<DateTime<Utc>>,
    pub attempt_count: u8,
}

/// 投递仿真器
pub struct DeliverySimulator {
    config: SimulatorConfig,
    rng: Mutex<StdRng>,
}

impl DeliverySimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// 固定种子的仿真器，测试用
    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn success_rate(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Sms => self.config.sms_success_rate,
            Channel::Email => self.config.email_success_rate,
            Channel::Phone => self.config.phone_success_rate,
        }
    }

    /// 渠道延迟窗口（分钟）：短信1-3，邮件2-5，电话0-1
    fn delay_window(channel: Channel) -> (i64, i64) {
        match channel {
            Channel::Sms => (1, 3),
            Channel::Email => (2, 5),
            Channel::Phone => (0, 1),
        }
    }

    /// 优先级对应的尝试预算
    pub fn attempt_budget(priority: CustomerPriority) -> u8 {
        if priority == CustomerPriority::Critical {
            CRITICAL_ATTEMPT_BUDGET
        } else {
            1
        }
    }

    /// 模拟一条消息的投递（含重试）
    ///
    /// 每次尝试独立判定成功与否，用尽预算后判为失败。
    pub fn deliver(
        &self,
        channel: Channel,
        priority: CustomerPriority,
        scheduled_at: DateTime<Utc>,
    ) -> DeliveryResult {
        let budget = Self::attempt_budget(priority);
        let rate = self.success_rate(channel);
        let (delay_min, delay_max) = Self::delay_window(channel);

        let mut rng = self.rng.lock().expect("投递RNG锁中毒");
        for attempt in 1..=budget {
            let success = rng.random::<f64>() < rate;
            if success {
                let delay = rng.random_range(delay_min..=delay_max);
                return DeliveryResult {
                    outcome: DeliveryOutcome::Delivered,
                    delivered_at: Some(scheduled_at + Duration::minutes(delay)),
                    attempt_count: attempt,
                };
            }
            debug!(?channel, attempt, "投递尝试失败");
        }

        DeliveryResult {
            outcome: DeliveryOutcome::Failed,
            delivered_at: None,
            attempt_count: budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget_by_priority() {
        assert_eq!(DeliverySimulator::attempt_budget(CustomerPriority::Critical), 3);
        assert_eq!(DeliverySimulator::attempt_budget(CustomerPriority::High), 1);
        assert_eq!(DeliverySimulator::attempt_budget(CustomerPriority::Standard), 1);
    }

    #[test]
    fn test_always_failing_channel_exhausts_budget() {
        let config = SimulatorConfig {
            sms_success_rate: 0.0,
            email_success_rate: 0.0,
            phone_success_rate: 0.0,
        };
        let simulator = DeliverySimulator::with_seed(config, 42);
        let result = simulator.deliver(Channel::Phone, CustomerPriority::Critical, Utc::now());
        assert_eq!(result.outcome, DeliveryOutcome::Failed);
        assert_eq!(result.attempt_count, 3);

        let result = simulator.deliver(Channel::Sms, CustomerPriority::Standard, Utc::now());
        assert_eq!(result.outcome, DeliveryOutcome::Failed);
        assert_eq!(result.attempt_count, 1);
    }

    #[test]
    fn test_always_succeeding_channel_delivers_first_attempt() {
        let config = SimulatorConfig {
            sms_success_rate: 1.0,
            email_success_rate: 1.0,
            phone_success_rate: 1.0,
        };
        let simulator = DeliverySimulator::with_seed(config, 7);
        let scheduled = Utc::now();
        let result = simulator.deliver(Channel::Email, CustomerPriority::Standard, scheduled);
        assert_eq!(result.outcome, DeliveryOutcome::Delivered);
        assert_eq!(result.attempt_count, 1);
        // 邮件延迟窗口2-5分钟
        let delay = (result.delivered_at.unwrap() - scheduled).num_minutes();
        assert!((2..=5).contains(&delay));
    }
}
