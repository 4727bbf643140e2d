use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{ClinicStore, InMemoryClinicStore};
use shared_models::{
    BookingRequest, BookingRequestStatus, Department, QueueItem, QueuePriority, QueueSource,
    QueueStatus,
};

use crate::clock::FixedClock;
use crate::state::ClinicState;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub clinic_utc_offset_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            clinic_utc_offset_minutes: 0,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            store_backend: StoreBackend::Memory,
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
            request_timeout_seconds: 5,
            port: 0,
        }
    }
}

/// Wednesday 2025-03-12 07:30 UTC; its week starts Monday 2025-03-10.
pub fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 12, 7, 30, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// UTC instant for a clinic-local date/time when the clinic runs on UTC.
pub fn at(day: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    day.and_time(time(h, m)).and_utc()
}

/// In-memory store seeded with one department, plus a controllable clock.
pub struct ClinicFixture {
    pub store: Arc<InMemoryClinicStore>,
    pub clock: Arc<FixedClock>,
    pub config: AppConfig,
    pub department: Department,
}

impl ClinicFixture {
    pub async fn new() -> Self {
        Self::with_default_interval(30).await
    }

    pub async fn with_default_interval(minutes: i32) -> Self {
        let store = Arc::new(InMemoryClinicStore::new());
        let department = Department {
            id: Uuid::new_v4(),
            name: "General Medicine".to_string(),
            default_slot_interval_minutes: minutes,
        };
        store.insert_department(department.clone()).await;

        Self {
            store,
            clock: Arc::new(FixedClock::new(fixture_now())),
            config: TestConfig::default().to_app_config(),
            department,
        }
    }

    pub fn state(&self) -> ClinicState {
        ClinicState::new(self.config.clone(), self.store.clone(), self.clock.clone())
    }

    pub fn today(&self) -> NaiveDate {
        fixture_now().date_naive()
    }

    pub async fn add_department(&self, name: &str, minutes: i32) -> Department {
        let department = Department {
            id: Uuid::new_v4(),
            name: name.to_string(),
            default_slot_interval_minutes: minutes,
        };
        self.store.insert_department(department.clone()).await;
        department
    }

    pub async fn add_booking_request(
        &self,
        day: NaiveDate,
        at_time: NaiveTime,
        status: BookingRequestStatus,
    ) -> BookingRequest {
        let request = BookingRequest {
            id: Uuid::new_v4(),
            department_id: self.department.id,
            requested_date: day,
            requested_time: at_time,
            status,
            preferred_doctor_id: None,
            beneficiary_id: None,
            created_at: fixture_now() - Duration::days(3),
        };
        self.store.insert_booking_request(request.clone()).await;
        request
    }

    pub async fn check_in(&self, item: QueueItem) -> QueueItem {
        self.store
            .insert_queue_item(item)
            .await
            .expect("fixture queue item should insert")
    }
}

pub fn booked_item(ticket: &str, department_id: Uuid, appointment_at: DateTime<Utc>) -> QueueItem {
    QueueItem {
        ticket: ticket.to_string(),
        source: QueueSource::Booked,
        priority: QueuePriority::Normal,
        status: QueueStatus::Scheduled,
        department_id,
        assigned_doctor_id: None,
        appointment_at: Some(appointment_at),
        added_at: appointment_at - Duration::hours(1),
        consultation_started_at: None,
        consultation_completed_at: None,
        booking_request_id: None,
    }
}

pub fn walk_in_item(ticket: &str, department_id: Uuid, added_at: DateTime<Utc>) -> QueueItem {
    QueueItem {
        ticket: ticket.to_string(),
        source: QueueSource::WalkIn,
        priority: QueuePriority::Normal,
        status: QueueStatus::Waiting,
        department_id,
        assigned_doctor_id: None,
        appointment_at: None,
        added_at,
        consultation_started_at: None,
        consultation_completed_at: None,
        booking_request_id: None,
    }
}

/// Completed item whose consultation lasted `minutes`, finishing at `completed_at`.
pub fn completed_item(
    ticket: &str,
    department_id: Uuid,
    doctor_id: Option<Uuid>,
    completed_at: DateTime<Utc>,
    minutes: i64,
) -> QueueItem {
    QueueItem {
        status: QueueStatus::Completed,
        assigned_doctor_id: doctor_id,
        consultation_started_at: Some(completed_at - Duration::minutes(minutes)),
        consultation_completed_at: Some(completed_at),
        ..walk_in_item(ticket, department_id, completed_at - Duration::minutes(minutes + 20))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default().to_app_config();

        assert_eq!(config.supabase_url, "http://localhost:54321");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.clinic_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_fixture_now_is_a_wednesday() {
        use chrono::{Datelike, Weekday};
        assert_eq!(fixture_now().weekday(), Weekday::Wed);
    }

    #[tokio::test]
    async fn test_fixture_seeds_department_and_clock() {
        let fixture = ClinicFixture::new().await;

        let department = fixture.store.read_department(fixture.department.id).await.unwrap();
        assert_eq!(department.unwrap().default_slot_interval_minutes, 30);

        fixture.clock.advance(Duration::minutes(5));
        assert_eq!(fixture.clock.now(), fixture_now() + Duration::minutes(5));
    }
}
