use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info};

use outage_core::models::{IncidentStatus, OutageCause};
use outage_core::{AppConfig, GeoPoint, GridDataSource};
use outage_dispatcher::{
    priority_score, CrewDispatcher, CrewRegistry, IncidentStore, OutageStatistics,
    RestorationPlanner,
};
use outage_infrastructure::JsonDataSource;
use outage_notifier::{DeliverySimulator, MessageKind, NotificationService, SimulatorConfig};

/// 主应用程序
///
/// 把数据源、事故存储、班组调度、恢复计划与客户通知装配为一个
/// 协调流程，并演示一次完整的停电事故处置。
pub struct Application {
    config: AppConfig,
    store: Arc<IncidentStore>,
    dispatcher: Arc<CrewDispatcher>,
    planner: Arc<RestorationPlanner>,
    notifier: Arc<NotificationService>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序，数据目录: {}", config.data_source.data_dir);

        let data_source: Arc<dyn GridDataSource> =
            Arc::new(JsonDataSource::new(&config.data_source.data_dir));

        // 班组名册从数据源载入调度注册表
        let registry = Arc::new(CrewRegistry::new());
        let crews = data_source
            .get_available_crews()
            .await
            .context("加载班组名册失败")?;
        info!("载入班组: {}", crews.len());
        registry.load(crews).await;

        let store = Arc::new(IncidentStore::new(data_source.clone()));
        let dispatcher = Arc::new(CrewDispatcher::new(registry, store.clone()));
        let planner = Arc::new(RestorationPlanner::new(data_source.clone()));
        let notifier = Arc::new(NotificationService::new(
            data_source,
            Arc::new(DeliverySimulator::new(SimulatorConfig::default())),
            &config.notifier,
        ));

        Ok(Self {
            config,
            store,
            dispatcher,
            planner,
            notifier,
        })
    }

    /// 执行一次完整的事故协调流程
    pub async fn run(&self) -> Result<()> {
        // 状态转换事件驱动后续客户通知
        let listener = self.spawn_transition_listener();

        let incident_id = self.report_substation_failure().await?;
        self.dispatch_and_plan(&incident_id).await?;
        self.restore_and_resolve(&incident_id).await?;

        // 等待尾部通知事件被消费
        tokio::time::sleep(Duration::from_millis(200)).await;
        listener.abort();

        self.report_statistics().await;
        Ok(())
    }

    /// 订阅事故状态转换并触发对应的客户通知
    ///
    /// 通知是尽力而为的：投递失败只记录日志，不影响事故工作流。
    fn spawn_transition_listener(&self) -> tokio::task::JoinHandle<()> {
        let mut events = self.store.subscribe();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event.to_status {
                    // 初报通知由流程显式发送，确认转换不再重复推送
                    IncidentStatus::Reported | IncidentStatus::Confirmed => {
                        debug!(incident_id = %event.incident.incident_id, "跳过确认阶段通知");
                    }
                    to_status => {
                        if let Err(e) = notifier.handle_transition(&event.incident, to_status).await
                        {
                            error!(
                                incident_id = %event.incident.incident_id,
                                error = %e,
                                "状态转换通知失败"
                            );
                        }
                    }
                }
            }
        })
    }

    /// 上报变电站故障，创建事故并发送初报通知
    async fn report_substation_failure(&self) -> Result<String> {
        let location = GeoPoint::new(40.7589, -73.9851).context("事故坐标非法")?;
        let incident_id = self
            .store
            .create_incident_from_equipment_failure(
                "SUB_001",
                OutageCause::EquipmentFailure,
                location,
                self.config.dispatcher.default_affected_radius_km,
            )
            .await
            .context("创建停电事故失败")?;

        let incident = self.store.snapshot(&incident_id).await?;
        info!(
            incident_id = %incident_id,
            severity = ?incident.severity,
            customers = incident.estimated_customers_affected,
            priority = priority_score(&incident, Utc::now()),
            "停电事故已上报"
        );

        let counts = self
            .notifier
            .notify_customers_of_outage(&incident, MessageKind::InitialOutage)
            .await?;
        info!(
            sms = counts.sms,
            email = counts.email,
            phone = counts.phone,
            "初报通知完成"
        );
        Ok(incident_id)
    }

    /// 派遣最优班组并生成恢复计划
    async fn dispatch_and_plan(&self, incident_id: &str) -> Result<()> {
        let assignment = self
            .dispatcher
            .dispatch_best(incident_id, self.config.dispatcher.default_duration_hours)
            .await?
            .context("没有可派遣的班组")?;
        info!(
            crew_id = %assignment.crew_id,
            eta = %assignment.estimated_arrival,
            "班组已派遣"
        );

        let incident = self.store.snapshot(incident_id).await?;
        let assignments = self.dispatcher.assignments_for_incident(incident_id).await;
        let plan = self.planner.generate_plan(&incident, &assignments).await?;
        info!(
            tasks = plan.tasks.len(),
            estimated_completion = %plan.estimated_completion,
            "恢复计划已生成"
        );
        for task in &plan.tasks {
            debug!(task_id = %task.task_id, description = %task.description, "恢复任务");
        }

        // 班组到场，开始抢修
        self.dispatcher
            .crew_arrived(&assignment.crew_id, incident_id)
            .await?;
        self.dispatcher
            .update_assignment_progress(&assignment.assignment_id, 25, "现场勘查完成")
            .await?;
        Ok(())
    }

    /// 推进恢复任务直至全部客户复电并关闭事故
    async fn restore_and_resolve(&self, incident_id: &str) -> Result<()> {
        let plan = self
            .planner
            .get_plan(incident_id)
            .await
            .context("恢复计划不存在")?;
        for task in &plan.tasks {
            self.planner
                .update_task_progress(incident_id, &task.task_id, 100, "任务完成")
                .await?;
        }

        // 抢修中途向客户推送进度
        let incident = self.store.snapshot(incident_id).await?;
        let notified = self
            .notifier
            .send_restoration_progress_update(&incident, Utc::now())
            .await?;
        info!(notified, "恢复进度已推送");

        // 全部客户复电后关闭事故
        self.store
            .record_customers_restored(incident_id, incident.estimated_customers_affected)
            .await?;
        let closed = self
            .dispatcher
            .close_assignments_for_incident(incident_id, Utc::now())
            .await?;
        let lead_crew = closed.first().map(|a| a.crew_id.clone());
        self.store
            .update_status(
                incident_id,
                IncidentStatus::Resolved,
                lead_crew.as_deref(),
                "全部客户已复电",
            )
            .await?;
        info!(incident_id = %incident_id, "事故已解决");
        Ok(())
    }

    /// 输出回看窗口内的运营统计
    async fn report_statistics(&self) {
        let stats = OutageStatistics::compute(&self.store, 24).await;
        info!(
            window_hours = stats.window_hours,
            total = stats.total_incidents,
            resolved = stats.resolved_incidents,
            cmi = stats.customer_minutes_interrupted,
            regulatory = stats.regulatory_reportable,
            "近24小时运营统计"
        );
        if let Some(avg) = stats.average_restoration_hours {
            info!(average_restoration_hours = avg, "平均恢复时长");
        }
    }
}
