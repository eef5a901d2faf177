use std::sync::Arc;

use outage_core::geo::GeoPoint;
use outage_core::models::{CustomerType, IncidentStatus, OutageCause, OutageSeverity};
use outage_core::OutageError;
use outage_dispatcher::store::IncidentStore;
use outage_dispatcher::statistics::OutageStatistics;
use outage_testing_utils::{CustomerBuilder, EquipmentBuilder, IncidentBuilder, MockGridDataSource};

fn incident_location() -> GeoPoint {
    GeoPoint::new(40.7589, -73.9851).unwrap()
}

fn data_source_with_hospital() -> MockGridDataSource {
    MockGridDataSource::new()
        .with_equipment(vec![EquipmentBuilder::new()
            .with_id("SUB_001")
            .with_customers_served(1200)
            .build()])
        .with_customers(vec![
            CustomerBuilder::new()
                .with_id("CUST_HOSPITAL")
                .with_name("Metro Hospital")
                .with_type(CustomerType::CriticalInfrastructure)
                .with_location(40.759, -73.985)
                .build(),
            CustomerBuilder::new()
                .with_id("CUST_SHOP")
                .with_type(CustomerType::Commercial)
                .with_location(40.76, -73.986)
                .build(),
            CustomerBuilder::new()
                .with_id("CUST_HOME")
                .with_type(CustomerType::Residential)
                .with_location(40.758, -73.984)
                .build(),
        ])
}

#[tokio::test]
async fn test_create_incident_from_equipment_failure() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    let incident_id = store
        .create_incident_from_equipment_failure(
            "SUB_001",
            OutageCause::EquipmentFailure,
            incident_location(),
            2.0,
        )
        .await
        .unwrap();

    let incident = store.snapshot(&incident_id).await.unwrap();
    assert_eq!(incident.status, IncidentStatus::Reported);
    assert_eq!(incident.critical_infrastructure_count, 1);
    assert_eq!(incident.commercial_customer_count, 1);
    assert_eq!(incident.residential_customer_count, 1);
    // 设备服务1200个客户，区域查询只命中3个，取较大者
    assert_eq!(incident.estimated_customers_affected, 1200);
    // 存在关键基础设施客户，严重度强制critical以上
    assert!(incident.severity >= OutageSeverity::Critical);
}

#[tokio::test]
async fn test_create_incident_unknown_equipment_fails() {
    let store = IncidentStore::new(Arc::new(MockGridDataSource::new()));
    let result = store
        .create_incident_from_equipment_failure(
            "SUB_404",
            OutageCause::EquipmentFailure,
            incident_location(),
            2.0,
        )
        .await;
    assert!(matches!(result, Err(OutageError::EquipmentNotFound { .. })));
}

#[tokio::test]
async fn test_full_lifecycle_appends_timeline() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    let id = store.insert(IncidentBuilder::new().build()).await;

    store
        .update_status(&id, IncidentStatus::Confirmed, None, "现场确认")
        .await
        .unwrap();
    store
        .update_status(&id, IncidentStatus::Assigned, Some("CREW_001"), "班组已派出")
        .await
        .unwrap();
    store
        .update_status(&id, IncidentStatus::InProgress, Some("CREW_001"), "到场抢修")
        .await
        .unwrap();

    store.record_customers_restored(&id, 250).await.unwrap();
    let resolved = store
        .update_status(&id, IncidentStatus::Resolved, Some("CREW_001"), "全部恢复")
        .await
        .unwrap();

    assert_eq!(resolved.timeline.len(), 4);
    assert!(resolved.actual_restoration_time.is_some());
    assert_eq!(resolved.timeline[1].crew_id.as_deref(), Some("CREW_001"));
    // 终态事故迁入历史表
    assert_eq!(store.active_count().await, 0);
    assert_eq!(store.history_snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_backward_transition_rejected_and_state_unchanged() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    let id = store
        .insert(
            IncidentBuilder::new()
                .with_status(IncidentStatus::InProgress)
                .build(),
        )
        .await;

    let result = store
        .update_status(&id, IncidentStatus::Confirmed, None, "尝试回退")
        .await;
    assert!(matches!(result, Err(OutageError::InvalidTransition { .. })));

    let unchanged = store.snapshot(&id).await.unwrap();
    assert_eq!(unchanged.status, IncidentStatus::InProgress);
    assert!(unchanged.timeline.is_empty());
}

#[tokio::test]
async fn test_skipped_transition_rejected() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    let id = store.insert(IncidentBuilder::new().build()).await;

    // reported -> assigned 跳过了confirmed
    let result = store
        .update_status(&id, IncidentStatus::Assigned, Some("CREW_001"), "跳跃")
        .await;
    assert!(matches!(result, Err(OutageError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_assigned_requires_crew_reference() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    let id = store
        .insert(
            IncidentBuilder::new()
                .with_status(IncidentStatus::Confirmed)
                .build(),
        )
        .await;

    let result = store
        .update_status(&id, IncidentStatus::Assigned, None, "缺少班组")
        .await;
    assert!(matches!(result, Err(OutageError::InvalidParams(_))));
    assert_eq!(
        store.snapshot(&id).await.unwrap().status,
        IncidentStatus::Confirmed
    );
}

#[tokio::test]
async fn test_resolve_requires_all_customers_restored() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    let id = store
        .insert(
            IncidentBuilder::new()
                .with_status(IncidentStatus::Confirmed)
                .build(),
        )
        .await;
    store
        .update_status(&id, IncidentStatus::Assigned, Some("CREW_001"), "")
        .await
        .unwrap();
    store
        .update_status(&id, IncidentStatus::InProgress, Some("CREW_001"), "")
        .await
        .unwrap();

    // 尚未记录客户恢复，拒绝进入resolved
    let result = store
        .update_status(&id, IncidentStatus::Resolved, Some("CREW_001"), "")
        .await;
    assert!(result.is_err());
    assert_eq!(
        store.snapshot(&id).await.unwrap().status,
        IncidentStatus::InProgress
    );
}

#[tokio::test]
async fn test_transition_broadcasts_event() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    let mut events = store.subscribe();
    let id = store.insert(IncidentBuilder::new().build()).await;

    store
        .update_status(&id, IncidentStatus::Confirmed, None, "确认")
        .await
        .unwrap();

    let event = events.try_recv().unwrap();
    assert_eq!(event.to_status, IncidentStatus::Confirmed);
    assert_eq!(event.incident.incident_id, id);
}

#[tokio::test]
async fn test_incidents_by_priority_ordering() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    store
        .insert(
            IncidentBuilder::new()
                .with_id("INC_SMALL")
                .with_severity(OutageSeverity::Minor)
                .with_customer_counts(0, 0, 20)
                .build(),
        )
        .await;
    store
        .insert(
            IncidentBuilder::new()
                .with_id("INC_BIG")
                .with_severity(OutageSeverity::Critical)
                .with_customer_counts(2, 100, 1500)
                .build(),
        )
        .await;

    let ranked = store.incidents_by_priority(chrono::Utc::now(), None).await;
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].0.incident_id, "INC_BIG");
    assert!(ranked[0].1 > ranked[1].1);
}

#[tokio::test]
async fn test_statistics_window() {
    let store = IncidentStore::new(Arc::new(data_source_with_hospital()));
    store
        .insert(
            IncidentBuilder::new()
                .with_id("INC_RECENT")
                .created_hours_ago(2)
                .build(),
        )
        .await;
    store
        .insert(
            IncidentBuilder::new()
                .with_id("INC_OLD")
                .created_hours_ago(48)
                .build(),
        )
        .await;

    let stats = OutageStatistics::compute(&store, 24).await;
    assert_eq!(stats.total_incidents, 1);
    assert_eq!(stats.active_incidents, 1);
}
