use assert_matches::assert_matches;
use chrono::Duration;

use live_queue_cell::services::QueueStatusService;
use shared_database::{ClinicStore, StatusUpdate};
use shared_models::{QueueStatus, SchedulingError};
use shared_utils::test_utils::{at, walk_in_item, ClinicFixture};
use shared_utils::Clock;

#[tokio::test]
async fn test_consultation_then_completion_records_both_times() {
    let fixture = ClinicFixture::new().await;
    fixture.check_in(walk_in_item("W-001", fixture.department.id, at(fixture.today(), 8, 0))).await;
    let service = QueueStatusService::new(&fixture.state());

    service.transition("W-001", "called").await.unwrap();
    let started = service.transition("W-001", "in_consultation").await.unwrap();
    assert_eq!(started.consultation_started_at, Some(fixture.clock.now()));
    assert_eq!(started.consultation_completed_at, None);

    fixture.clock.advance(Duration::minutes(14));
    let done = service.transition("W-001", "completed").await.unwrap();

    let (begin, end) = (done.consultation_started_at.unwrap(), done.consultation_completed_at.unwrap());
    assert!(begin < end);
    assert_eq!(end - begin, Duration::minutes(14));
}

#[tokio::test]
async fn test_completing_straight_from_waiting_uses_one_instant() {
    let fixture = ClinicFixture::new().await;
    fixture.check_in(walk_in_item("W-001", fixture.department.id, at(fixture.today(), 8, 0))).await;
    let service = QueueStatusService::new(&fixture.state());

    let done = service.transition("W-001", "done").await.unwrap();

    assert_eq!(done.status, QueueStatus::Completed);
    assert_eq!(done.consultation_started_at, done.consultation_completed_at);
    assert_eq!(done.consultation_completed_at, Some(fixture.clock.now()));
}

#[tokio::test]
async fn test_repeating_a_status_is_a_no_op() {
    let fixture = ClinicFixture::new().await;
    fixture.check_in(walk_in_item("W-001", fixture.department.id, at(fixture.today(), 8, 0))).await;
    let service = QueueStatusService::new(&fixture.state());

    let first = service.transition("W-001", "in progress").await.unwrap();
    fixture.clock.advance(Duration::minutes(3));
    let again = service.transition("W-001", "In Consultation").await.unwrap();

    assert_eq!(again, first);
}

#[tokio::test]
async fn test_empty_status_means_waiting() {
    let fixture = ClinicFixture::new().await;
    fixture.check_in(walk_in_item("W-001", fixture.department.id, at(fixture.today(), 8, 0))).await;
    let service = QueueStatusService::new(&fixture.state());

    service.transition("W-001", "called").await.unwrap();
    let back = service.transition("W-001", "").await.unwrap();

    assert_eq!(back.status, QueueStatus::Waiting);
}

#[tokio::test]
async fn test_unknown_status_and_ticket() {
    let fixture = ClinicFixture::new().await;
    fixture.check_in(walk_in_item("W-001", fixture.department.id, at(fixture.today(), 8, 0))).await;
    let service = QueueStatusService::new(&fixture.state());

    assert_matches!(service.transition("W-001", "teleported").await, Err(SchedulingError::InvalidInput(_)));
    assert_matches!(service.transition("W-404", "called").await, Err(SchedulingError::NotFound(_)));
}

#[tokio::test]
async fn test_stale_expected_status_conflicts() {
    let fixture = ClinicFixture::new().await;
    fixture.check_in(walk_in_item("W-001", fixture.department.id, at(fixture.today(), 8, 0))).await;

    let update = StatusUpdate {
        status: QueueStatus::Called,
        consultation_started_at: None,
        consultation_completed_at: None,
    };
    let result = fixture
        .store
        .update_queue_item_status("W-001", update, QueueStatus::Scheduled)
        .await;

    assert_matches!(result, Err(SchedulingError::Conflict(_)));
    let item = fixture.store.read_queue_item("W-001").await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Waiting);
}
