use assert_matches::assert_matches;
use chrono::Duration;
use uuid::Uuid;

use live_queue_cell::models::AverageBasis;
use live_queue_cell::services::{QueueStatusService, WaitEstimator, DEFAULT_CONSULTATION_MINUTES};
use shared_models::{QueueItem, QueuePriority, SchedulingError};
use shared_utils::test_utils::{at, booked_item, completed_item, fixture_now, walk_in_item, ClinicFixture};

async fn morning_queue(fixture: &ClinicFixture) {
    let dept = fixture.department.id;
    let today = fixture.today();
    fixture.check_in(booked_item("B-0900", dept, at(today, 9, 0))).await;
    fixture.check_in(booked_item("B-0930", dept, at(today, 9, 30))).await;
    fixture.check_in(walk_in_item("W-001", dept, at(today, 9, 10))).await;
}

#[tokio::test]
async fn test_head_of_queue_waits_for_nobody() {
    let fixture = ClinicFixture::new().await;
    morning_queue(&fixture).await;
    let estimator = WaitEstimator::new(&fixture.state());

    let head = estimator.wait_estimate("B-0900").await.unwrap();
    assert_eq!(head.waiting_ahead, Some(0));
    assert_eq!(head.eta_minutes, 0);
    assert_eq!(head.eta_label, "Now");

    let walk_in = estimator.wait_estimate("W-001").await.unwrap();
    assert_eq!(walk_in.waiting_ahead, Some(1));
    assert_eq!(walk_in.eta_minutes, DEFAULT_CONSULTATION_MINUTES);
    assert_eq!(walk_in.basis, AverageBasis::Default);

    let last = estimator.wait_estimate("B-0930").await.unwrap();
    assert_eq!(last.waiting_ahead, Some(2));
    assert_eq!(last.eta_label, "20 min");
}

#[tokio::test]
async fn test_completing_head_moves_everyone_up_by_one() {
    let fixture = ClinicFixture::new().await;
    morning_queue(&fixture).await;
    let state = fixture.state();
    let estimator = WaitEstimator::new(&state);
    let status = QueueStatusService::new(&state);

    let mut before = Vec::new();
    for ticket in ["W-001", "B-0930"] {
        before.push(estimator.wait_estimate(ticket).await.unwrap().waiting_ahead.unwrap());
    }

    status.transition("B-0900", "in consultation").await.unwrap();
    fixture.clock.advance(Duration::minutes(15));
    status.transition("B-0900", "done").await.unwrap();

    for (ticket, was) in ["W-001", "B-0930"].into_iter().zip(before) {
        let now = estimator.wait_estimate(ticket).await.unwrap().waiting_ahead.unwrap();
        assert_eq!(now, was - 1, "ticket {}", ticket);
    }

    let done = estimator.wait_estimate("B-0900").await.unwrap();
    assert_eq!(done.waiting_ahead, None);
    assert_eq!(done.eta_minutes, 0);
}

#[tokio::test]
async fn test_urgent_walk_in_goes_first() {
    let fixture = ClinicFixture::new().await;
    morning_queue(&fixture).await;
    fixture
        .check_in(QueueItem {
            priority: QueuePriority::Urgent,
            ..walk_in_item("W-URG", fixture.department.id, at(fixture.today(), 9, 50))
        })
        .await;

    let estimator = WaitEstimator::new(&fixture.state());
    assert_eq!(estimator.wait_estimate("W-URG").await.unwrap().waiting_ahead, Some(0));
    assert_eq!(estimator.wait_estimate("B-0900").await.unwrap().waiting_ahead, Some(1));
}

#[tokio::test]
async fn test_department_average_from_history() {
    let fixture = ClinicFixture::new().await;
    let dept = fixture.department.id;
    let yesterday = fixture_now() - Duration::days(1);
    fixture.check_in(completed_item("H-1", dept, None, yesterday, 12)).await;
    fixture.check_in(completed_item("H-2", dept, None, yesterday, 18)).await;
    // outside the plausible range
    fixture.check_in(completed_item("H-3", dept, None, yesterday, 200)).await;
    fixture.check_in(completed_item("H-4", dept, None, yesterday, 0)).await;
    // older than the lookback
    fixture.check_in(completed_item("H-5", dept, None, fixture_now() - Duration::days(45), 60)).await;

    let estimator = WaitEstimator::new(&fixture.state());
    let average = estimator.average_consultation(dept, None).await.unwrap();

    assert_eq!(average.minutes, 15);
    assert_eq!(average.basis, AverageBasis::Department);
    assert_eq!(average.sample_count, 2);
}

#[tokio::test]
async fn test_doctor_average_wins_when_available() {
    let fixture = ClinicFixture::new().await;
    let dept = fixture.department.id;
    let doctor = Uuid::new_v4();
    let idle_doctor = Uuid::new_v4();
    let yesterday = fixture_now() - Duration::days(1);
    fixture.check_in(completed_item("H-1", dept, Some(doctor), yesterday, 25)).await;
    fixture.check_in(completed_item("H-2", dept, None, yesterday, 5)).await;

    let estimator = WaitEstimator::new(&fixture.state());

    let own = estimator.average_consultation(dept, Some(doctor)).await.unwrap();
    assert_eq!(own.minutes, 25);
    assert_eq!(own.basis, AverageBasis::Doctor);

    let fallback = estimator.average_consultation(dept, Some(idle_doctor)).await.unwrap();
    assert_eq!(fallback.minutes, 15);
    assert_eq!(fallback.basis, AverageBasis::Department);
}

#[tokio::test]
async fn test_position_estimate_and_board() {
    let fixture = ClinicFixture::new().await;
    morning_queue(&fixture).await;
    let dept = fixture.department.id;
    let yesterday = fixture_now() - Duration::days(1);
    fixture.check_in(completed_item("H-1", dept, None, yesterday, 25)).await;

    let estimator = WaitEstimator::new(&fixture.state());

    let estimate = estimator.estimate_for_position(dept, 3, None).await.unwrap();
    assert_eq!(estimate.eta_minutes, 75);
    assert_eq!(estimate.eta_label, "1 hr 15 min");

    let board = estimator.queue_board(dept, None).await.unwrap();
    let tickets: Vec<_> = board.entries.iter().map(|e| e.ticket.as_str()).collect();
    assert_eq!(tickets, vec!["B-0900", "W-001", "B-0930"]);
    assert_eq!(board.entries[2].eta_label, "50 min");
}

#[tokio::test]
async fn test_unknown_ticket_is_not_found() {
    let fixture = ClinicFixture::new().await;
    let estimator = WaitEstimator::new(&fixture.state());

    assert_matches!(estimator.wait_estimate("nope").await, Err(SchedulingError::NotFound(_)));
}
