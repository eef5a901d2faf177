use std::sync::Arc;

use chrono::Utc;

use outage_core::models::{
    CrewSpecialization, CrewStatus, IncidentStatus, OutageCause, SkillLevel,
};
use outage_core::OutageError;
use outage_dispatcher::dispatch::{CrewDispatcher, CrewRegistry};
use outage_dispatcher::store::IncidentStore;
use outage_testing_utils::{CrewBuilder, IncidentBuilder, MockGridDataSource};

fn make_services() -> (Arc<CrewRegistry>, Arc<IncidentStore>, CrewDispatcher) {
    let registry = Arc::new(CrewRegistry::new());
    let store = Arc::new(IncidentStore::new(Arc::new(MockGridDataSource::new())));
    let dispatcher = CrewDispatcher::new(registry.clone(), store.clone());
    (registry, store, dispatcher)
}

#[tokio::test]
async fn test_ineligible_crews_never_selected() {
    let (registry, store, dispatcher) = make_services();
    registry
        .load(vec![
            CrewBuilder::new()
                .with_id("CREW_TIRED")
                .with_hours_worked(16.0)
                .build(),
            CrewBuilder::new()
                .with_id("CREW_BUSY")
                .with_status(CrewStatus::Dispatched)
                .build(),
            CrewBuilder::new()
                .with_id("CREW_ONSITE")
                .with_status(CrewStatus::OnSite)
                .build(),
            CrewBuilder::new()
                .with_id("CREW_OFF")
                .with_status(CrewStatus::OffDuty)
                .build(),
            CrewBuilder::new()
                .with_id("CREW_LOADED")
                .with_assignments(vec!["INC_A", "INC_B"])
                .build(),
            CrewBuilder::new()
                .with_id("CREW_LATE")
                .with_shift_remaining_hours(3)
                .build(),
        ])
        .await;

    let id = store.insert(IncidentBuilder::new().build()).await;
    let incident = store.snapshot(&id).await.unwrap();
    let recommendation = dispatcher
        .find_optimal_crew(&incident, Utc::now())
        .await
        .unwrap();
    assert!(recommendation.is_none(), "不应选出任何不合格班组");
}

#[tokio::test]
async fn test_scoring_prefers_specialization_and_distance() {
    let (registry, store, dispatcher) = make_services();
    // 事故起因为设备故障，需要变电站技师
    registry
        .load(vec![
            CrewBuilder::new()
                .with_id("CREW_SUB")
                .with_specialization(CrewSpecialization::SubstationTech)
                .with_skill_level(SkillLevel::Expert)
                .with_location(40.76, -73.99)
                .build(),
            CrewBuilder::new()
                .with_id("CREW_TREE")
                .with_specialization(CrewSpecialization::TreeRemoval)
                .with_skill_level(SkillLevel::Expert)
                .with_location(40.76, -73.99)
                .build(),
        ])
        .await;

    let id = store
        .insert(
            IncidentBuilder::new()
                .with_cause(OutageCause::EquipmentFailure)
                .build(),
        )
        .await;
    let incident = store.snapshot(&id).await.unwrap();
    let best = dispatcher
        .find_optimal_crew(&incident, Utc::now())
        .await
        .unwrap()
        .expect("应选出班组");
    assert_eq!(best.crew_id, "CREW_SUB");
    assert_eq!(best.score.specialization_score, 100.0);
    assert_eq!(best.score.experience_bonus, 20.0);
    // 客户影响加分上限500
    assert!(best.score.customer_bonus <= 500.0);
}

#[tokio::test]
async fn test_tie_breaks_by_smallest_crew_id() {
    let (registry, store, dispatcher) = make_services();
    registry
        .load(vec![
            CrewBuilder::new().with_id("CREW_B").build(),
            CrewBuilder::new().with_id("CREW_A").build(),
        ])
        .await;

    let id = store.insert(IncidentBuilder::new().build()).await;
    let incident = store.snapshot(&id).await.unwrap();
    let best = dispatcher
        .find_optimal_crew(&incident, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.crew_id, "CREW_A");
}

#[tokio::test]
async fn test_assign_crew_books_and_transitions() {
    let (registry, store, dispatcher) = make_services();
    registry
        .load(vec![CrewBuilder::new().with_id("CREW_001").build()])
        .await;
    let id = store.insert(IncidentBuilder::new().build()).await;

    let assignment = dispatcher.assign_crew("CREW_001", &id, 6.0).await.unwrap();
    assert_eq!(assignment.crew_id, "CREW_001");
    assert_eq!(assignment.incident_id, id);
    assert!(assignment.estimated_completion > assignment.estimated_arrival);

    let incident = store.snapshot(&id).await.unwrap();
    assert_eq!(incident.status, IncidentStatus::Assigned);
    assert_eq!(incident.assigned_crew_ids, vec!["CREW_001".to_string()]);

    let crew = registry.get("CREW_001").await.unwrap();
    assert_eq!(crew.status, CrewStatus::Dispatched);
    assert_eq!(crew.current_assignments, vec![id.clone()]);
}

#[tokio::test]
async fn test_fully_loaded_crew_booking_fails_unchanged() {
    let (registry, store, dispatcher) = make_services();
    registry
        .load(vec![CrewBuilder::new()
            .with_id("CREW_FULL")
            .with_assignments(vec!["INC_X", "INC_Y"])
            .build()])
        .await;
    let id = store.insert(IncidentBuilder::new().build()).await;

    let result = dispatcher.assign_crew("CREW_FULL", &id, 4.0).await;
    assert!(matches!(result, Err(OutageError::CrewUnavailable { .. })));

    // 班组与事故状态均未被改动
    let crew = registry.get("CREW_FULL").await.unwrap();
    assert_eq!(crew.current_assignments.len(), 2);
    assert_eq!(crew.status, CrewStatus::Available);
    assert_eq!(
        store.snapshot(&id).await.unwrap().status,
        IncidentStatus::Reported
    );
}

#[tokio::test]
async fn test_assign_rejected_for_in_progress_incident() {
    let (registry, store, dispatcher) = make_services();
    registry
        .load(vec![CrewBuilder::new().with_id("CREW_001").build()])
        .await;
    let id = store
        .insert(
            IncidentBuilder::new()
                .with_status(IncidentStatus::InProgress)
                .build(),
        )
        .await;

    let result = dispatcher.assign_crew("CREW_001", &id, 4.0).await;
    assert!(matches!(result, Err(OutageError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_dispatch_best_falls_back_when_best_is_taken() {
    let (registry, store, dispatcher) = make_services();
    // 技能最高的班组已满载，不进入候选名单，应选中次优
    registry
        .load(vec![
            CrewBuilder::new()
                .with_id("CREW_BEST")
                .with_skill_level(SkillLevel::Expert)
                .with_assignments(vec!["INC_X", "INC_Y"])
                .build(),
            CrewBuilder::new()
                .with_id("CREW_NEXT")
                .with_skill_level(SkillLevel::Junior)
                .build(),
        ])
        .await;
    let id = store.insert(IncidentBuilder::new().build()).await;

    let assignment = dispatcher.dispatch_best(&id, 4.0).await.unwrap().unwrap();
    assert_eq!(assignment.crew_id, "CREW_NEXT");
}

#[tokio::test]
async fn test_concurrent_booking_single_winner() {
    let (registry, store, dispatcher) = make_services();
    let dispatcher = Arc::new(dispatcher);
    // 只留一个空位：两起事故抢同一班组，恰有一方成功
    registry
        .load(vec![CrewBuilder::new()
            .with_id("CREW_HOT")
            .with_assignments(vec!["INC_EARLIER"])
            .build()])
        .await;
    let id_a = store.insert(IncidentBuilder::new().with_id("INC_A").build()).await;
    let id_b = store.insert(IncidentBuilder::new().with_id("INC_B").build()).await;

    let d1 = dispatcher.clone();
    let d2 = dispatcher.clone();
    let (r1, r2) = tokio::join!(
        d1.assign_crew("CREW_HOT", &id_a, 4.0),
        d2.assign_crew("CREW_HOT", &id_b, 4.0),
    );

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "恰有一方预订成功");
    let loser = if r1.is_ok() { r2 } else { r1 };
    assert!(matches!(loser, Err(OutageError::CrewUnavailable { .. })));
}

#[tokio::test]
async fn test_concurrent_assign_rolls_back_losing_booking() {
    // 同一事故上两路并发派单：失败方的预订必须被撤销，
    // 班组不能滞留在dispatched状态占用派单名额
    for round in 0..200 {
        let (registry, store, dispatcher) = make_services();
        let dispatcher = Arc::new(dispatcher);
        registry
            .load(vec![
                CrewBuilder::new().with_id("CREW_A").build(),
                CrewBuilder::new().with_id("CREW_B").build(),
            ])
            .await;
        let id = store.insert(IncidentBuilder::new().build()).await;

        let d1 = dispatcher.clone();
        let d2 = dispatcher.clone();
        let (r1, r2) = tokio::join!(
            d1.assign_crew("CREW_A", &id, 4.0),
            d2.assign_crew("CREW_B", &id, 4.0),
        );

        let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "第{round}轮：恰有一方派单成功");

        let incident = store.snapshot(&id).await.unwrap();
        assert_eq!(incident.status, IncidentStatus::Assigned);
        assert_eq!(incident.assigned_crew_ids.len(), 1, "第{round}轮：仅记录胜者");

        let winner_id = incident.assigned_crew_ids[0].as_str();
        let loser_id = if winner_id == "CREW_A" { "CREW_B" } else { "CREW_A" };
        let loser = registry.get(loser_id).await.unwrap();
        assert_eq!(
            loser.status,
            CrewStatus::Available,
            "第{round}轮：失败方班组状态未恢复"
        );
        assert!(
            loser.current_assignments.is_empty(),
            "第{round}轮：失败方残留幽灵预订 {:?}",
            loser.current_assignments
        );
    }
}

#[tokio::test]
async fn test_crew_arrival_and_closure() {
    let (registry, store, dispatcher) = make_services();
    registry
        .load(vec![CrewBuilder::new().with_id("CREW_001").build()])
        .await;
    let id = store.insert(IncidentBuilder::new().build()).await;

    dispatcher.assign_crew("CREW_001", &id, 4.0).await.unwrap();
    dispatcher.crew_arrived("CREW_001", &id).await.unwrap();
    assert_eq!(
        store.snapshot(&id).await.unwrap().status,
        IncidentStatus::InProgress
    );
    assert_eq!(
        registry.get("CREW_001").await.unwrap().status,
        CrewStatus::OnSite
    );

    store
        .record_customers_restored(&id, u32::MAX)
        .await
        .unwrap();
    store
        .update_status(&id, IncidentStatus::Resolved, Some("CREW_001"), "恢复完成")
        .await
        .unwrap();
    let closed = dispatcher
        .close_assignments_for_incident(&id, Utc::now())
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].work_progress_percent, 100);
    assert!(closed[0].actual_completion.is_some());

    let crew = registry.get("CREW_001").await.unwrap();
    assert!(crew.current_assignments.is_empty());
    assert_eq!(crew.status, CrewStatus::Returning);
}
