//! 客户通知服务
//!
//! 按分级策略为受影响客户排期通知，经有界工作池并发投递仿真，
//! 并把每次尝试写入只追加的投递日志。投递失败不会中断
//! 事故工作流；事故已解决时仍在排队的非critical通知会被取消。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use outage_core::config::NotifierConfig;
use outage_core::models::{
    Channel, Customer, CustomerPriority, IncidentStatus, NotificationRecord, OutageIncident,
};
use outage_core::{GridDataSource, OutageResult};

use crate::delivery::DeliverySimulator;
use crate::policy::{self, NotificationPolicy};
use crate::templates::{render_message, MessageKind};

/// 各渠道的通知计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounts {
    pub sms: usize,
    pub email: usize,
    pub phone: usize,
}

impl ChannelCounts {
    fn bump(&mut self, channel: Channel) {
        match channel {
            Channel::Sms => self.sms += 1,
            Channel::Email => self.email += 1,
            Channel::Phone => self.phone += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sms + self.email + self.phone
    }
}

/// 客户通知服务
pub struct NotificationService {
    data_source: Arc<dyn GridDataSource>,
    simulator: Arc<DeliverySimulator>,
    policy: NotificationPolicy,
    delivery_log: Arc<Mutex<Vec<NotificationRecord>>>,
    /// (事故, 客户) -> 最近一次进度更新时刻，控制更新节奏
    progress_marks: Mutex<HashMap<(String, String), DateTime<Utc>>>,
    worker_count: usize,
}

impl NotificationService {
    pub fn new(
        data_source: Arc<dyn GridDataSource>,
        simulator: Arc<DeliverySimulator>,
        config: &NotifierConfig,
    ) -> Self {
        Self {
            data_source,
            simulator,
            policy: NotificationPolicy::from_config(config),
            delivery_log: Arc::new(Mutex::new(Vec::new())),
            progress_marks: Mutex::new(HashMap::new()),
            worker_count: config.worker_count.max(1),
        }
    }

    /// 状态转换触发的通知（尽力而为，不与转换构成事务）
    pub async fn handle_transition(
        &self,
        incident: &OutageIncident,
        to_status: IncidentStatus,
    ) -> OutageResult<ChannelCounts> {
        let kind = match to_status {
            IncidentStatus::Reported | IncidentStatus::Confirmed => MessageKind::InitialOutage,
            IncidentStatus::Assigned | IncidentStatus::InProgress => MessageKind::CrewDispatched,
            IncidentStatus::Resolved => MessageKind::RestorationComplete,
        };
        self.notify_customers_of_outage(incident, kind).await
    }

    /// 向全部受影响客户发送停电通知
    ///
    /// 渠道与时限按客户分级决定；投递经有界工作池并发执行，
    /// 在途任务数不超过工作池宽度，客户数可达数千也不会
    /// 无限制地创建任务。
    pub async fn notify_customers_of_outage(
        &self,
        incident: &OutageIncident,
        kind: MessageKind,
    ) -> OutageResult<ChannelCounts> {
        let customers = self
            .data_source
            .get_customers_in_area(incident.location, incident.affected_radius_km)
            .await?;

        info!(
            incident_id = %incident.incident_id,
            customers = customers.len(),
            kind = ?kind,
            "开始客户通知"
        );

        let now = Utc::now();
        let incident = Arc::new(incident.clone());
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut join_set = JoinSet::new();

        let mut counts = ChannelCounts::default();
        for customer in customers {
            // 先取许可再spawn：在途任务数始终有界
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("通知工作池信号量已关闭");
            let simulator = self.simulator.clone();
            let log = self.delivery_log.clone();
            let incident = incident.clone();

            join_set.spawn(async move {
                let _permit = permit;
                deliver_to_customer(&customer, &incident, kind, &simulator, &log, now)
            });

            // 顺带收割已完成的任务，避免结果堆积
            while let Some(joined) = join_set.try_join_next() {
                collect_channels(joined, &mut counts);
            }
        }

        while let Some(joined) = join_set.join_next().await {
            collect_channels(joined, &mut counts);
        }

        info!(
            incident_id = %incident.incident_id,
            sms = counts.sms,
            email = counts.email,
            phone = counts.phone,
            "客户通知完成"
        );
        Ok(counts)
    }

    /// 向受影响客户推送恢复进度更新
    ///
    /// 夜间静默时段只向关键基础设施客户推送；每客户按分级节奏
    /// 限频（关键基础设施1小时，其余2小时）。返回收到更新的客户数。
    pub async fn send_restoration_progress_update(
        &self,
        incident: &OutageIncident,
        at: DateTime<Utc>,
    ) -> OutageResult<usize> {
        let customers = self
            .data_source
            .get_customers_in_area(incident.location, incident.affected_radius_km)
            .await?;

        let recipients: Vec<Customer> = customers
            .into_iter()
            .filter(|c| self.policy.should_send_progress_update(c, at))
            .filter(|c| self.progress_update_due(incident, c, at))
            .collect();

        debug!(
            incident_id = %incident.incident_id,
            recipients = recipients.len(),
            "推送进度更新"
        );

        let incident = Arc::new(incident.clone());
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut join_set = JoinSet::new();
        for customer in recipients {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("通知工作池信号量已关闭");
            let simulator = self.simulator.clone();
            let log = self.delivery_log.clone();
            let incident = incident.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let sent = deliver_to_customer(
                    &customer,
                    &incident,
                    MessageKind::DelayNotification,
                    &simulator,
                    &log,
                    at,
                );
                (customer.customer_id, !sent.is_empty())
            });
        }

        let mut notified = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((customer_id, true)) => {
                    notified += 1;
                    self.mark_progress_update(&incident.incident_id, &customer_id, at);
                }
                Ok((_, false)) => {}
                Err(e) => warn!(error = %e, "进度更新任务意外中止"),
            }
        }
        Ok(notified)
    }

    /// 按分级节奏判断该客户是否到了下一次进度更新时间
    fn progress_update_due(
        &self,
        incident: &OutageIncident,
        customer: &Customer,
        at: DateTime<Utc>,
    ) -> bool {
        let marks = self.progress_marks.lock().expect("进度节奏表锁中毒");
        let key = (
            incident.incident_id.clone(),
            customer.customer_id.clone(),
        );
        match marks.get(&key) {
            Some(last) => {
                let interval = policy::update_interval_hours(customer.customer_type) as i64;
                at - *last >= Duration::hours(interval)
            }
            None => true,
        }
    }

    fn mark_progress_update(&self, incident_id: &str, customer_id: &str, at: DateTime<Utc>) {
        self.progress_marks
            .lock()
            .expect("进度节奏表锁中毒")
            .insert((incident_id.to_string(), customer_id.to_string()), at);
    }

    /// 投递日志快照（只读，供报表使用）
    pub fn delivery_log(&self) -> Vec<NotificationRecord> {
        self.delivery_log.lock().expect("投递日志锁中毒").clone()
    }
}

fn collect_channels(
    joined: Result<Vec<Channel>, tokio::task::JoinError>,
    counts: &mut ChannelCounts,
) {
    match joined {
        Ok(sent) => {
            for channel in sent {
                counts.bump(channel);
            }
        }
        Err(e) => warn!(error = %e, "通知任务意外中止"),
    }
}

/// 客户的有效消息优先级：关键基础设施一律critical
fn effective_priority(customer: &Customer) -> CustomerPriority {
    if customer.is_critical_infrastructure() {
        CustomerPriority::Critical
    } else {
        customer.priority_level
    }
}

/// 向单个客户投递一组通知，返回实际排期的渠道
///
/// 事故已解决时取消非critical通知；critical通知照常投递并记录结果。
fn deliver_to_customer(
    customer: &Customer,
    incident: &OutageIncident,
    kind: MessageKind,
    simulator: &DeliverySimulator,
    log: &Mutex<Vec<NotificationRecord>>,
    now: DateTime<Utc>,
) -> Vec<Channel> {
    let priority = effective_priority(customer);
    let channels = policy::channels_for_tier(customer.customer_type);
    let delay = policy::max_delay_minutes(customer.customer_type);
    let scheduled_at = now + Duration::minutes(delay as i64);
    let message = render_message(kind, customer, incident);

    let cancel_queued = incident.status == IncidentStatus::Resolved
        && kind != MessageKind::RestorationComplete
        && priority != CustomerPriority::Critical;

    let mut sent = Vec::new();
    for channel in channels {
        let record = if cancel_queued {
            NotificationRecord {
                customer_id: customer.customer_id.clone(),
                incident_id: incident.incident_id.clone(),
                channel,
                message: message.clone(),
                priority,
                scheduled_at,
                delivered_at: None,
                outcome: outage_core::models::DeliveryOutcome::Cancelled,
                attempt_count: 0,
            }
        } else {
            let result = simulator.deliver(channel, priority, scheduled_at);
            sent.push(channel);
            NotificationRecord {
                customer_id: customer.customer_id.clone(),
                incident_id: incident.incident_id.clone(),
                channel,
                message: message.clone(),
                priority,
                scheduled_at,
                delivered_at: result.delivered_at,
                outcome: result.outcome,
                attempt_count: result.attempt_count,
            }
        };
        log.lock().expect("投递日志锁中毒").push(record);
    }
    sent
}
