use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use shared_database::{ClinicStore, InMemoryClinicStore, SlotClaim, StatusUpdate, WeekWriteGuard};
use shared_models::{
    BookingRequest, BookingRequestStatus, Department, OpenSlot, QueueItem, QueuePriority, QueueSource,
    QueueStatus, SchedulingError, WeekAvailability, WeekWindow,
};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn window() -> WeekWindow {
    WeekWindow {
        week_start: monday(),
        starts_at: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap(),
    }
}

fn item(ticket: &str, department_id: Uuid, status: QueueStatus) -> QueueItem {
    let at = Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap();
    QueueItem {
        ticket: ticket.to_string(),
        source: QueueSource::Booked,
        priority: QueuePriority::Normal,
        status,
        department_id,
        assigned_doctor_id: None,
        appointment_at: Some(at),
        added_at: at - Duration::minutes(30),
        consultation_started_at: None,
        consultation_completed_at: None,
        booking_request_id: None,
    }
}

async fn store_with_department(minutes: i32) -> (InMemoryClinicStore, Department) {
    let store = InMemoryClinicStore::new();
    let department = Department {
        id: Uuid::new_v4(),
        name: "Cardiology".to_string(),
        default_slot_interval_minutes: minutes,
    };
    store.insert_department(department.clone()).await;
    (store, department)
}

#[tokio::test]
async fn test_week_upsert_is_keyed_by_department_and_week() {
    let (store, department) = store_with_department(30).await;
    let row = |minutes, open| WeekAvailability {
        department_id: department.id,
        week_start_date: monday(),
        slot_interval_minutes: minutes,
        is_open: open,
        updated_at: None,
    };

    store.upsert_week_availability(row(15, true), WeekWriteGuard::Unguarded).await.unwrap();
    store.upsert_week_availability(row(20, false), WeekWriteGuard::Unguarded).await.unwrap();

    let rows = store
        .list_week_availability(department.id, monday(), monday() + Duration::weeks(4))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].slot_interval_minutes, 20);
    assert!(!rows[0].is_open);
}

#[tokio::test]
async fn test_guard_compares_against_department_default_without_row() {
    let (store, department) = store_with_department(30).await;
    store.insert_queue_item(item("B-1", department.id, QueueStatus::Scheduled)).await.unwrap();

    let change = WeekAvailability {
        department_id: department.id,
        week_start_date: monday(),
        slot_interval_minutes: 15,
        is_open: true,
        updated_at: None,
    };
    let result = store
        .upsert_week_availability(change, WeekWriteGuard::FreezeIfBooked(window()))
        .await;
    assert_matches!(result, Err(SchedulingError::Conflict(_)));
    assert!(store.read_week_availability(department.id, monday()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bookings_exist_ignores_rejected_requests_and_other_weeks() {
    let (store, department) = store_with_department(30).await;
    let request = |day: u32, status| BookingRequest {
        id: Uuid::new_v4(),
        department_id: department.id,
        requested_date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
        requested_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        status,
        preferred_doctor_id: None,
        beneficiary_id: None,
        created_at: Utc::now(),
    };
    store.insert_booking_request(request(12, BookingRequestStatus::Rejected)).await;
    store.insert_booking_request(request(17, BookingRequestStatus::Confirmed)).await;
    assert!(!store.bookings_exist(department.id, window()).await.unwrap());

    store.insert_booking_request(request(16, BookingRequestStatus::Pending)).await;
    assert!(store.bookings_exist(department.id, window()).await.unwrap());
}

#[tokio::test]
async fn test_released_check_ins_do_not_count_as_bookings() {
    let (store, department) = store_with_department(30).await;
    store.insert_queue_item(item("B-1", department.id, QueueStatus::Cancelled)).await.unwrap();
    store.insert_queue_item(item("B-2", department.id, QueueStatus::NoShow)).await.unwrap();
    assert!(!store.bookings_exist(department.id, window()).await.unwrap());

    store.insert_queue_item(item("B-3", department.id, QueueStatus::Completed)).await.unwrap();
    assert!(store.bookings_exist(department.id, window()).await.unwrap());
}

#[tokio::test]
async fn test_booking_footprint_covers_a_span_of_weeks() {
    let (store, department) = store_with_department(30).await;
    let next = WeekWindow {
        week_start: monday() + Duration::days(7),
        starts_at: window().ends_at,
        ends_at: window().ends_at + Duration::days(7),
    };
    store.insert_booking_request(BookingRequest {
        id: Uuid::new_v4(),
        department_id: department.id,
        requested_date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
        requested_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        status: BookingRequestStatus::Confirmed,
        preferred_doctor_id: None,
        beneficiary_id: None,
        created_at: Utc::now(),
    })
    .await;
    store.insert_queue_item(item("B-1", department.id, QueueStatus::Waiting)).await.unwrap();
    store.insert_queue_item(item("B-2", department.id, QueueStatus::NoShow)).await.unwrap();

    let footprint = store
        .booking_footprint(department.id, window().through(&next))
        .await
        .unwrap();

    assert_eq!(footprint.requested_dates, vec![NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()]);
    assert_eq!(footprint.appointments.len(), 1);
    assert!(footprint.touches(&window()));
    assert!(footprint.touches(&next));
}

#[tokio::test]
async fn test_duplicate_ticket_is_an_integrity_error() {
    let (store, department) = store_with_department(30).await;
    store.insert_queue_item(item("B-1", department.id, QueueStatus::Scheduled)).await.unwrap();

    let result = store.insert_queue_item(item("B-1", department.id, QueueStatus::Waiting)).await;
    assert_matches!(result, Err(SchedulingError::Integrity(_)));
}

#[tokio::test]
async fn test_status_write_is_conditional() {
    let (store, department) = store_with_department(30).await;
    store.insert_queue_item(item("B-1", department.id, QueueStatus::Scheduled)).await.unwrap();
    let update = StatusUpdate {
        status: QueueStatus::Called,
        consultation_started_at: None,
        consultation_completed_at: None,
    };

    let moved = store
        .update_queue_item_status("B-1", update.clone(), QueueStatus::Scheduled)
        .await
        .unwrap();
    assert_eq!(moved.status, QueueStatus::Called);

    let stale = store.update_queue_item_status("B-1", update, QueueStatus::Scheduled).await;
    assert_matches!(stale, Err(SchedulingError::Conflict(_)));
}

#[tokio::test]
async fn test_claim_consumes_slot_exactly_once() {
    let (store, department) = store_with_department(30).await;
    store.insert_queue_item(item("B-1", department.id, QueueStatus::Scheduled)).await.unwrap();
    let slot_time = Utc.with_ymd_and_hms(2025, 3, 12, 8, 30, 0).unwrap();
    let slot = store
        .create_open_slot(OpenSlot::new(department.id, slot_time, "B-0", Utc::now()))
        .await
        .unwrap();
    let claim = SlotClaim {
        open_slot_id: slot.id,
        ticket: "B-1".to_string(),
        expected_status: QueueStatus::Scheduled,
        expected_appointment_at: Some(Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap()),
        new_status: QueueStatus::Waiting,
        vacated: None,
    };

    let claimed = store.claim_open_slot(claim.clone()).await.unwrap().unwrap();
    assert_eq!(claimed.item.appointment_at, Some(slot_time));
    assert_eq!(claimed.item.status, QueueStatus::Waiting);

    assert_eq!(store.claim_open_slot(claim).await.unwrap(), None);
    assert!(!store.delete_open_slot(slot.id).await.unwrap());
}

#[tokio::test]
async fn test_declined_offers_accumulate_once_per_ticket() {
    let (store, department) = store_with_department(30).await;
    let slot = store
        .create_open_slot(OpenSlot::new(department.id, Utc::now(), "B-0", Utc::now()))
        .await
        .unwrap();

    store.record_declined_offer(slot.id, "B-1").await.unwrap();
    store.record_declined_offer(slot.id, "B-2").await.unwrap();
    let slot = store.record_declined_offer(slot.id, "B-1").await.unwrap().unwrap();

    assert_eq!(slot.offered_to_tickets, vec!["B-1".to_string(), "B-2".to_string()]);
    assert_eq!(store.record_declined_offer(Uuid::new_v4(), "B-1").await.unwrap(), None);
}

#[tokio::test]
async fn test_completed_durations_newest_first_and_limited() {
    let (store, department) = store_with_department(30).await;
    let base = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    for n in 0..5 {
        let completed_at = base + Duration::days(n);
        store
            .insert_queue_item(QueueItem {
                consultation_started_at: Some(completed_at - Duration::minutes(10 + n)),
                consultation_completed_at: Some(completed_at),
                ..item(&format!("H-{}", n), department.id, QueueStatus::Completed)
            })
            .await
            .unwrap();
    }

    let samples = store
        .list_completed_durations(department.id, None, base + Duration::days(1), 3)
        .await
        .unwrap();

    assert_eq!(samples.len(), 3);
    assert_eq!(samples[0].consultation_completed_at, base + Duration::days(4));
    assert!(samples
        .windows(2)
        .all(|w| w[0].consultation_completed_at >= w[1].consultation_completed_at));
}
