use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use shared_models::{
    BookingFootprint, BookingRequest, BookingRequestStatus, ConsultationSample, Department, OpenSlot,
    QueueItem, QueueStatus, SchedulingError, SchedulingResult, WeekAvailability, WeekSpan, WeekWindow,
};

/// New status plus the full consultation timestamp pair it leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: QueueStatus,
    pub consultation_started_at: Option<DateTime<Utc>>,
    pub consultation_completed_at: Option<DateTime<Utc>>,
}

/// Check evaluated inside the same atomic write as a week upsert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeekWriteGuard {
    Unguarded,
    /// Once the window holds bookings, neither its interval nor its open flag may change.
    FreezeIfBooked(WeekWindow),
}

impl WeekWriteGuard {
    /// `effective_interval` is the interval the existing bookings were made under.
    pub fn check(
        &self,
        bookings_exist: bool,
        effective_interval: i32,
        row: &WeekAvailability,
    ) -> SchedulingResult<()> {
        let WeekWriteGuard::FreezeIfBooked(window) = self else {
            return Ok(());
        };
        if !bookings_exist {
            return Ok(());
        }
        if !row.is_open {
            return Err(SchedulingError::Conflict(format!(
                "week of {} already has bookings and cannot be closed",
                window.week_start
            )));
        }
        if row.slot_interval_minutes != effective_interval {
            return Err(SchedulingError::Conflict(format!(
                "week of {} already has bookings made at {}-minute intervals",
                window.week_start, effective_interval
            )));
        }
        Ok(())
    }
}

/// Atomic hand-over of an open slot to one queue item.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotClaim {
    pub open_slot_id: Uuid,
    pub ticket: String,
    /// The item must still be in this status when the claim is written.
    pub expected_status: QueueStatus,
    /// The item's appointment time must still be this value.
    pub expected_appointment_at: Option<DateTime<Utc>>,
    pub new_status: QueueStatus,
    /// Slot to open for the time the claimant gives up, if any.
    pub vacated: Option<OpenSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedSlot {
    pub slot: OpenSlot,
    pub item: QueueItem,
    pub vacated: Option<OpenSlot>,
}

/// Persistence contract of the scheduling engine.
///
/// Every method is one atomic operation against the store. Methods that take an
/// `expected_*` argument are conditional writes and fail with
/// [`SchedulingError::Conflict`] when the stored value has moved on.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn read_department(&self, id: Uuid) -> SchedulingResult<Option<Department>>;

    async fn read_week_availability(
        &self,
        department_id: Uuid,
        week_start: NaiveDate,
    ) -> SchedulingResult<Option<WeekAvailability>>;

    async fn list_week_availability(
        &self,
        department_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SchedulingResult<Vec<WeekAvailability>>;

    /// Upsert keyed by (department, week start) with `guard` checked in the same write.
    async fn upsert_week_availability(
        &self,
        row: WeekAvailability,
        guard: WeekWriteGuard,
    ) -> SchedulingResult<WeekAvailability>;

    /// Pending/confirmed requests dated in the window, or booked queue items inside it
    /// that still hold their time (not cancelled, not no-show).
    async fn bookings_exist(&self, department_id: Uuid, window: WeekWindow) -> SchedulingResult<bool>;

    /// Same bookings as [`ClinicStore::bookings_exist`], located across a whole span in one read.
    async fn booking_footprint(&self, department_id: Uuid, span: WeekSpan) -> SchedulingResult<BookingFootprint>;

    async fn list_active_queue_items(
        &self,
        department_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> SchedulingResult<Vec<QueueItem>>;

    /// Active walk-ins, optionally limited to one department.
    async fn list_active_walk_ins(&self, department_id: Option<Uuid>) -> SchedulingResult<Vec<QueueItem>>;

    async fn read_queue_item(&self, ticket: &str) -> SchedulingResult<Option<QueueItem>>;

    /// Fails with [`SchedulingError::Integrity`] on a duplicate ticket.
    async fn insert_queue_item(&self, item: QueueItem) -> SchedulingResult<QueueItem>;

    async fn update_queue_item_status(
        &self,
        ticket: &str,
        update: StatusUpdate,
        expected_previous: QueueStatus,
    ) -> SchedulingResult<QueueItem>;

    /// Marks the item no-show and opens its slot in one write.
    async fn record_no_show(
        &self,
        ticket: &str,
        expected_previous: QueueStatus,
        slot: OpenSlot,
    ) -> SchedulingResult<(QueueItem, OpenSlot)>;

    async fn create_open_slot(&self, slot: OpenSlot) -> SchedulingResult<OpenSlot>;

    async fn read_open_slot(&self, id: Uuid) -> SchedulingResult<Option<OpenSlot>>;

    async fn list_open_slots(&self, department_id: Uuid) -> SchedulingResult<Vec<OpenSlot>>;

    /// Appends `ticket` to the slot's declined list. `None` when the slot is gone.
    async fn record_declined_offer(&self, id: Uuid, ticket: &str) -> SchedulingResult<Option<OpenSlot>>;

    /// `None` when the slot no longer exists (someone else took it).
    async fn claim_open_slot(&self, claim: SlotClaim) -> SchedulingResult<Option<ClaimedSlot>>;

    /// `true` if this call removed the slot.
    async fn delete_open_slot(&self, id: Uuid) -> SchedulingResult<bool>;

    /// Completed consultations with both timestamps, most recent first.
    async fn list_completed_durations(
        &self,
        department_id: Uuid,
        doctor_id: Option<Uuid>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> SchedulingResult<Vec<ConsultationSample>>;

    async fn list_booking_requests(
        &self,
        department_id: Option<Uuid>,
        status: BookingRequestStatus,
        on_or_before: NaiveDate,
    ) -> SchedulingResult<Vec<BookingRequest>>;

    async fn update_booking_request_status(
        &self,
        id: Uuid,
        status: BookingRequestStatus,
        expected_previous: BookingRequestStatus,
    ) -> SchedulingResult<BookingRequest>;
}
