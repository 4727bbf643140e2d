use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::{
    BookingFootprint, BookingRequest, BookingRequestStatus, ConsultationSample, Department, OpenSlot,
    QueueItem, QueueStatus, SchedulingError, SchedulingResult, WeekAvailability, WeekSpan, WeekWindow,
};

use crate::store::{ClaimedSlot, ClinicStore, SlotClaim, StatusUpdate, WeekWriteGuard};

#[derive(Debug, Default)]
struct ClinicTables {
    departments: HashMap<Uuid, Department>,
    weeks: HashMap<(Uuid, NaiveDate), WeekAvailability>,
    booking_requests: HashMap<Uuid, BookingRequest>,
    queue_items: HashMap<String, QueueItem>,
    open_slots: HashMap<Uuid, OpenSlot>,
}

impl ClinicTables {
    fn booking_footprint(&self, department_id: Uuid, span: &WeekSpan) -> BookingFootprint {
        let requested_dates = self
            .booking_requests
            .values()
            .filter(|r| r.department_id == department_id && r.status.holds_week())
            .map(|r| r.requested_date)
            .filter(|d| *d >= span.first_day && *d <= span.last_day)
            .collect();
        let appointments = self
            .queue_items
            .values()
            .filter(|item| item.department_id == department_id && item.holds_booking())
            .filter_map(|item| item.appointment_at)
            .filter(|at| *at >= span.starts_at && *at < span.ends_at)
            .collect();

        BookingFootprint {
            requested_dates,
            appointments,
        }
    }

    fn bookings_exist(&self, department_id: Uuid, window: &WeekWindow) -> bool {
        self.booking_footprint(department_id, &WeekSpan::from(*window))
            .touches(window)
    }

    fn queue_item_mut(&mut self, ticket: &str) -> SchedulingResult<&mut QueueItem> {
        self.queue_items
            .get_mut(ticket)
            .ok_or_else(|| SchedulingError::NotFound(format!("ticket {}", ticket)))
    }
}

/// Store held entirely in process memory.
///
/// A single mutex guards all tables, so each trait method observes and
/// writes a consistent snapshot. Used for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryClinicStore {
    tables: Mutex<ClinicTables>,
}

impl InMemoryClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_department(&self, department: Department) {
        let mut tables = self.tables.lock().await;
        tables.departments.insert(department.id, department);
    }

    pub async fn insert_booking_request(&self, request: BookingRequest) {
        let mut tables = self.tables.lock().await;
        tables.booking_requests.insert(request.id, request);
    }

    pub async fn read_booking_request(&self, id: Uuid) -> Option<BookingRequest> {
        let tables = self.tables.lock().await;
        tables.booking_requests.get(&id).cloned()
    }
}

#[async_trait]
impl ClinicStore for InMemoryClinicStore {
    async fn read_department(&self, id: Uuid) -> SchedulingResult<Option<Department>> {
        let tables = self.tables.lock().await;
        Ok(tables.departments.get(&id).cloned())
    }

    async fn read_week_availability(
        &self,
        department_id: Uuid,
        week_start: NaiveDate,
    ) -> SchedulingResult<Option<WeekAvailability>> {
        let tables = self.tables.lock().await;
        Ok(tables.weeks.get(&(department_id, week_start)).cloned())
    }

    async fn list_week_availability(
        &self,
        department_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SchedulingResult<Vec<WeekAvailability>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<WeekAvailability> = tables
            .weeks
            .values()
            .filter(|w| w.department_id == department_id && w.week_start_date >= from && w.week_start_date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.week_start_date);
        Ok(rows)
    }

    async fn upsert_week_availability(
        &self,
        row: WeekAvailability,
        guard: WeekWriteGuard,
    ) -> SchedulingResult<WeekAvailability> {
        let mut tables = self.tables.lock().await;

        let department = tables
            .departments
            .get(&row.department_id)
            .ok_or_else(|| SchedulingError::InvalidInput(format!("unknown department {}", row.department_id)))?;

        let key = (row.department_id, row.week_start_date);
        let effective_interval = tables
            .weeks
            .get(&key)
            .map(|w| w.interval())
            .unwrap_or_else(|| department.default_interval())
            .minutes();

        let bookings_exist = match &guard {
            WeekWriteGuard::FreezeIfBooked(window) => tables.bookings_exist(row.department_id, window),
            WeekWriteGuard::Unguarded => false,
        };
        if let Err(e) = guard.check(bookings_exist, effective_interval, &row) {
            warn!("Week upsert rejected for department {}: {}", row.department_id, e);
            return Err(e);
        }

        tables.weeks.insert(key, row.clone());
        Ok(row)
    }

    async fn bookings_exist(&self, department_id: Uuid, window: WeekWindow) -> SchedulingResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.bookings_exist(department_id, &window))
    }

    async fn booking_footprint(&self, department_id: Uuid, span: WeekSpan) -> SchedulingResult<BookingFootprint> {
        let tables = self.tables.lock().await;
        Ok(tables.booking_footprint(department_id, &span))
    }

    async fn list_active_queue_items(
        &self,
        department_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> SchedulingResult<Vec<QueueItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .queue_items
            .values()
            .filter(|item| item.department_id == department_id && item.status.is_active())
            .filter(|item| doctor_id.is_none() || item.assigned_doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    async fn list_active_walk_ins(&self, department_id: Option<Uuid>) -> SchedulingResult<Vec<QueueItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .queue_items
            .values()
            .filter(|item| item.is_walk_in() && item.status.is_active())
            .filter(|item| department_id.map_or(true, |d| item.department_id == d))
            .cloned()
            .collect())
    }

    async fn read_queue_item(&self, ticket: &str) -> SchedulingResult<Option<QueueItem>> {
        let tables = self.tables.lock().await;
        Ok(tables.queue_items.get(ticket).cloned())
    }

    async fn insert_queue_item(&self, item: QueueItem) -> SchedulingResult<QueueItem> {
        let mut tables = self.tables.lock().await;
        if tables.queue_items.contains_key(&item.ticket) {
            return Err(SchedulingError::Integrity(format!("duplicate ticket {}", item.ticket)));
        }
        tables.queue_items.insert(item.ticket.clone(), item.clone());
        Ok(item)
    }

    async fn update_queue_item_status(
        &self,
        ticket: &str,
        update: StatusUpdate,
        expected_previous: QueueStatus,
    ) -> SchedulingResult<QueueItem> {
        let mut tables = self.tables.lock().await;
        let item = tables.queue_item_mut(ticket)?;

        if item.status != expected_previous {
            return Err(SchedulingError::Conflict(format!(
                "ticket {} is now {}, expected {}",
                ticket, item.status, expected_previous
            )));
        }

        item.status = update.status;
        item.consultation_started_at = update.consultation_started_at;
        item.consultation_completed_at = update.consultation_completed_at;
        debug!("Ticket {} moved {} -> {}", ticket, expected_previous, item.status);
        Ok(item.clone())
    }

    async fn record_no_show(
        &self,
        ticket: &str,
        expected_previous: QueueStatus,
        slot: OpenSlot,
    ) -> SchedulingResult<(QueueItem, OpenSlot)> {
        let mut tables = self.tables.lock().await;
        let item = tables.queue_item_mut(ticket)?;

        if item.status != expected_previous {
            return Err(SchedulingError::Conflict(format!(
                "ticket {} is now {}, expected {}",
                ticket, item.status, expected_previous
            )));
        }

        item.status = QueueStatus::NoShow;
        let item = item.clone();
        tables.open_slots.insert(slot.id, slot.clone());
        Ok((item, slot))
    }

    async fn create_open_slot(&self, slot: OpenSlot) -> SchedulingResult<OpenSlot> {
        let mut tables = self.tables.lock().await;
        if tables.open_slots.contains_key(&slot.id) {
            return Err(SchedulingError::Integrity(format!("duplicate open slot {}", slot.id)));
        }
        tables.open_slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn read_open_slot(&self, id: Uuid) -> SchedulingResult<Option<OpenSlot>> {
        let tables = self.tables.lock().await;
        Ok(tables.open_slots.get(&id).cloned())
    }

    async fn list_open_slots(&self, department_id: Uuid) -> SchedulingResult<Vec<OpenSlot>> {
        let tables = self.tables.lock().await;
        let mut slots: Vec<OpenSlot> = tables
            .open_slots
            .values()
            .filter(|s| s.department_id == department_id)
            .cloned()
            .collect();
        slots.sort_by(|a, b| {
            a.appointment_at
                .cmp(&b.appointment_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(slots)
    }

    async fn record_declined_offer(&self, id: Uuid, ticket: &str) -> SchedulingResult<Option<OpenSlot>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.open_slots.get_mut(&id).map(|slot| {
            if !slot.was_declined_by(ticket) {
                slot.offered_to_tickets.push(ticket.to_string());
            }
            slot.clone()
        }))
    }

    async fn claim_open_slot(&self, claim: SlotClaim) -> SchedulingResult<Option<ClaimedSlot>> {
        let mut tables = self.tables.lock().await;

        let Some(slot) = tables.open_slots.get(&claim.open_slot_id).cloned() else {
            return Ok(None);
        };

        let item = tables.queue_item_mut(&claim.ticket)?;
        if item.status != claim.expected_status || item.appointment_at != claim.expected_appointment_at {
            return Err(SchedulingError::Conflict(format!(
                "ticket {} changed while the slot was being offered",
                claim.ticket
            )));
        }

        item.appointment_at = Some(slot.appointment_at);
        item.status = claim.new_status;
        let item = item.clone();

        tables.open_slots.remove(&slot.id);
        if let Some(vacated) = &claim.vacated {
            tables.open_slots.insert(vacated.id, vacated.clone());
        }

        Ok(Some(ClaimedSlot {
            slot,
            item,
            vacated: claim.vacated,
        }))
    }

    async fn delete_open_slot(&self, id: Uuid) -> SchedulingResult<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables.open_slots.remove(&id).is_some())
    }

    async fn list_completed_durations(
        &self,
        department_id: Uuid,
        doctor_id: Option<Uuid>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> SchedulingResult<Vec<ConsultationSample>> {
        let tables = self.tables.lock().await;
        let mut samples: Vec<ConsultationSample> = tables
            .queue_items
            .values()
            .filter(|item| item.department_id == department_id && item.status == QueueStatus::Completed)
            .filter(|item| doctor_id.is_none() || item.assigned_doctor_id == doctor_id)
            .filter_map(|item| match (item.consultation_started_at, item.consultation_completed_at) {
                (Some(started), Some(completed)) if completed >= since => Some(ConsultationSample {
                    consultation_started_at: started,
                    consultation_completed_at: completed,
                }),
                _ => None,
            })
            .collect();
        samples.sort_by(|a, b| b.consultation_completed_at.cmp(&a.consultation_completed_at));
        samples.truncate(limit);
        Ok(samples)
    }

    async fn list_booking_requests(
        &self,
        department_id: Option<Uuid>,
        status: BookingRequestStatus,
        on_or_before: NaiveDate,
    ) -> SchedulingResult<Vec<BookingRequest>> {
        let tables = self.tables.lock().await;
        let mut requests: Vec<BookingRequest> = tables
            .booking_requests
            .values()
            .filter(|r| r.status == status && r.requested_date <= on_or_before)
            .filter(|r| department_id.map_or(true, |d| r.department_id == d))
            .cloned()
            .collect();
        requests.sort_by(|a, b| {
            (a.requested_date, a.requested_time).cmp(&(b.requested_date, b.requested_time))
        });
        Ok(requests)
    }

    async fn update_booking_request_status(
        &self,
        id: Uuid,
        status: BookingRequestStatus,
        expected_previous: BookingRequestStatus,
    ) -> SchedulingResult<BookingRequest> {
        let mut tables = self.tables.lock().await;
        let request = tables
            .booking_requests
            .get_mut(&id)
            .ok_or_else(|| SchedulingError::NotFound(format!("booking request {}", id)))?;

        if request.status != expected_previous {
            return Err(SchedulingError::Conflict(format!(
                "booking request {} is now {}",
                id,
                request.status.as_str()
            )));
        }

        request.status = status;
        Ok(request.clone())
    }
}
