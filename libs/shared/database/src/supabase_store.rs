use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    BookingFootprint, BookingRequest, BookingRequestStatus, ConsultationSample, Department, OpenSlot,
    QueueItem, QueueStatus, SchedulingError, SchedulingResult, WeekAvailability, WeekSpan, WeekWindow,
};

use crate::store::{ClaimedSlot, ClinicStore, SlotClaim, StatusUpdate, WeekWriteGuard};
use crate::supabase::{SupabaseApiError, SupabaseClient};

const ACTIVE_STATUS_FILTER: &str = "in.(waiting,scheduled,called,in_consultation)";
/// Booked items in these states have given their appointment time up.
const RELEASED_STATUS_FILTER: &str = "not.in.(cancelled,no_show)";

/// Raised by the database functions when a guarded write is refused.
const GUARD_VIOLATION_CODE: &str = "P0001";
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// [`ClinicStore`] backed by Supabase's PostgREST API.
///
/// Single-row conditional writes use `PATCH` with the expected value in the
/// filter; multi-row atomic operations go through Postgres functions.
pub struct SupabaseClinicStore {
    supabase: SupabaseClient,
}

impl SupabaseClinicStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn get_rows<T: DeserializeOwned>(&self, path: &str) -> SchedulingResult<Vec<T>> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None)
            .await
            .map_err(map_store_error)?;
        decode_rows(rows)
    }

    async fn get_first<T: DeserializeOwned>(&self, path: &str) -> SchedulingResult<Option<T>> {
        Ok(self.get_rows(path).await?.into_iter().next())
    }

    /// Distinguishes "row missing" from "row changed" after a conditional write matched nothing.
    async fn explain_missed_ticket(&self, ticket: &str, expected: QueueStatus) -> SchedulingError {
        match self.read_queue_item(ticket).await {
            Ok(Some(current)) => SchedulingError::Conflict(format!(
                "ticket {} is now {}, expected {}",
                ticket, current.status, expected
            )),
            Ok(None) => SchedulingError::NotFound(format!("ticket {}", ticket)),
            Err(e) => e,
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    urlencoding::encode(&at.to_rfc3339_opts(SecondsFormat::Millis, true)).into_owned()
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> SchedulingResult<Vec<T>> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| SchedulingError::Database(format!("unexpected row shape: {}", e)))
}

fn decode_value<T: DeserializeOwned>(value: Value) -> SchedulingResult<T> {
    serde_json::from_value(value).map_err(|e| SchedulingError::Database(format!("unexpected row shape: {}", e)))
}

fn map_store_error(err: anyhow::Error) -> SchedulingError {
    match err.downcast_ref::<SupabaseApiError>() {
        Some(api) if api.code().as_deref() == Some(UNIQUE_VIOLATION_CODE) => {
            SchedulingError::Integrity(api.message())
        }
        Some(api) if api.status == 409 || api.code().as_deref() == Some(GUARD_VIOLATION_CODE) => {
            SchedulingError::Conflict(api.message())
        }
        Some(api) if api.status == 404 => SchedulingError::NotFound(api.message()),
        Some(api) => SchedulingError::Database(api.to_string()),
        None => SchedulingError::Database(err.to_string()),
    }
}

#[async_trait]
impl ClinicStore for SupabaseClinicStore {
    async fn read_department(&self, id: Uuid) -> SchedulingResult<Option<Department>> {
        let path = format!(
            "/rest/v1/departments?id=eq.{}&select=id,name,default_slot_interval_minutes",
            id
        );
        self.get_first(&path).await
    }

    async fn read_week_availability(
        &self,
        department_id: Uuid,
        week_start: NaiveDate,
    ) -> SchedulingResult<Option<WeekAvailability>> {
        let path = format!(
            "/rest/v1/week_availability?department_id=eq.{}&week_start_date=eq.{}",
            department_id, week_start
        );
        self.get_first(&path).await
    }

    async fn list_week_availability(
        &self,
        department_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SchedulingResult<Vec<WeekAvailability>> {
        let path = format!(
            "/rest/v1/week_availability?department_id=eq.{}&week_start_date=gte.{}&week_start_date=lte.{}&order=week_start_date.asc",
            department_id, from, to
        );
        self.get_rows(&path).await
    }

    async fn upsert_week_availability(
        &self,
        row: WeekAvailability,
        guard: WeekWriteGuard,
    ) -> SchedulingResult<WeekAvailability> {
        let (freeze_if_booked, window) = match guard {
            WeekWriteGuard::FreezeIfBooked(window) => (true, Some(window)),
            WeekWriteGuard::Unguarded => (false, None),
        };

        let args = json!({
            "p_department_id": row.department_id,
            "p_week_start_date": row.week_start_date,
            "p_slot_interval_minutes": row.slot_interval_minutes,
            "p_is_open": row.is_open,
            "p_freeze_if_booked": freeze_if_booked,
            "p_window_starts_at": window.map(|w| w.starts_at),
            "p_window_ends_at": window.map(|w| w.ends_at),
        });

        let result: Value = self
            .supabase
            .rpc("set_week_availability", args)
            .await
            .map_err(map_store_error)?;

        debug!("Week {} upserted for department {}", row.week_start_date, row.department_id);
        match result {
            Value::Array(rows) => decode_rows::<WeekAvailability>(rows)?
                .into_iter()
                .next()
                .ok_or_else(|| SchedulingError::Database("set_week_availability returned no row".to_string())),
            other => decode_value(other),
        }
    }

    async fn bookings_exist(&self, department_id: Uuid, window: WeekWindow) -> SchedulingResult<bool> {
        let requests_path = format!(
            "/rest/v1/booking_requests?department_id=eq.{}&requested_date=gte.{}&requested_date=lte.{}&status=in.(pending,confirmed)&select=id&limit=1",
            department_id,
            window.week_start,
            window.last_day()
        );
        let requests: Vec<Value> = self
            .supabase
            .request(Method::GET, &requests_path, None)
            .await
            .map_err(map_store_error)?;
        if !requests.is_empty() {
            return Ok(true);
        }

        let items_path = format!(
            "/rest/v1/queue_items?department_id=eq.{}&source=eq.booked&status={}&appointment_at=gte.{}&appointment_at=lt.{}&select=ticket&limit=1",
            department_id,
            RELEASED_STATUS_FILTER,
            timestamp(window.starts_at),
            timestamp(window.ends_at)
        );
        let items: Vec<Value> = self
            .supabase
            .request(Method::GET, &items_path, None)
            .await
            .map_err(map_store_error)?;
        Ok(!items.is_empty())
    }

    async fn booking_footprint(&self, department_id: Uuid, span: WeekSpan) -> SchedulingResult<BookingFootprint> {
        let requests_path = format!(
            "/rest/v1/booking_requests?department_id=eq.{}&requested_date=gte.{}&requested_date=lte.{}&status=in.(pending,confirmed)&select=requested_date",
            department_id, span.first_day, span.last_day
        );
        let requests: Vec<Value> = self
            .supabase
            .request(Method::GET, &requests_path, None)
            .await
            .map_err(map_store_error)?;

        let items_path = format!(
            "/rest/v1/queue_items?department_id=eq.{}&source=eq.booked&status={}&appointment_at=gte.{}&appointment_at=lt.{}&select=appointment_at",
            department_id,
            RELEASED_STATUS_FILTER,
            timestamp(span.starts_at),
            timestamp(span.ends_at)
        );
        let items: Vec<Value> = self
            .supabase
            .request(Method::GET, &items_path, None)
            .await
            .map_err(map_store_error)?;

        let requested_dates = requests
            .into_iter()
            .map(|row| decode_value::<NaiveDate>(row["requested_date"].clone()))
            .collect::<SchedulingResult<Vec<_>>>()?;
        let appointments = items
            .into_iter()
            .map(|row| decode_value::<DateTime<Utc>>(row["appointment_at"].clone()))
            .collect::<SchedulingResult<Vec<_>>>()?;

        debug!(
            "Booking footprint for department {} from {} to {}: {} requests, {} check-ins",
            department_id,
            span.first_day,
            span.last_day,
            requested_dates.len(),
            appointments.len()
        );
        Ok(BookingFootprint {
            requested_dates,
            appointments,
        })
    }

    async fn list_active_queue_items(
        &self,
        department_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> SchedulingResult<Vec<QueueItem>> {
        let mut path = format!(
            "/rest/v1/queue_items?department_id=eq.{}&status={}",
            department_id, ACTIVE_STATUS_FILTER
        );
        if let Some(doctor) = doctor_id {
            path.push_str(&format!("&assigned_doctor_id=eq.{}", doctor));
        }
        self.get_rows(&path).await
    }

    async fn list_active_walk_ins(&self, department_id: Option<Uuid>) -> SchedulingResult<Vec<QueueItem>> {
        let mut path = format!("/rest/v1/queue_items?source=eq.walk_in&status={}", ACTIVE_STATUS_FILTER);
        if let Some(department) = department_id {
            path.push_str(&format!("&department_id=eq.{}", department));
        }
        self.get_rows(&path).await
    }

    async fn read_queue_item(&self, ticket: &str) -> SchedulingResult<Option<QueueItem>> {
        let path = format!("/rest/v1/queue_items?ticket=eq.{}", urlencoding::encode(ticket));
        self.get_first(&path).await
    }

    async fn insert_queue_item(&self, item: QueueItem) -> SchedulingResult<QueueItem> {
        let body = serde_json::to_value(&item)
            .map_err(|e| SchedulingError::InvalidInput(format!("queue item does not serialize: {}", e)))?;
        let rows = self
            .supabase
            .request_returning(Method::POST, "/rest/v1/queue_items", Some(body))
            .await
            .map_err(map_store_error)?;
        decode_rows::<QueueItem>(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("insert returned no row".to_string()))
    }

    async fn update_queue_item_status(
        &self,
        ticket: &str,
        update: StatusUpdate,
        expected_previous: QueueStatus,
    ) -> SchedulingResult<QueueItem> {
        let path = format!(
            "/rest/v1/queue_items?ticket=eq.{}&status=eq.{}",
            urlencoding::encode(ticket),
            expected_previous
        );
        let body = json!({
            "status": update.status,
            "consultation_started_at": update.consultation_started_at,
            "consultation_completed_at": update.consultation_completed_at,
        });

        let rows = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(body))
            .await
            .map_err(map_store_error)?;

        match decode_rows::<QueueItem>(rows)?.into_iter().next() {
            Some(item) => Ok(item),
            None => {
                let err = self.explain_missed_ticket(ticket, expected_previous).await;
                warn!("Conditional status write for {} missed: {}", ticket, err);
                Err(err)
            }
        }
    }

    async fn record_no_show(
        &self,
        ticket: &str,
        expected_previous: QueueStatus,
        slot: OpenSlot,
    ) -> SchedulingResult<(QueueItem, OpenSlot)> {
        let args = json!({
            "p_ticket": ticket,
            "p_expected_status": expected_previous,
            "p_open_slot": slot,
        });
        let result: Value = self
            .supabase
            .rpc("report_no_show", args)
            .await
            .map_err(map_store_error)?;

        if result.is_null() || result["item"].is_null() {
            return Err(self.explain_missed_ticket(ticket, expected_previous).await);
        }

        let item: QueueItem = decode_value(result["item"].clone())?;
        let slot: OpenSlot = decode_value(result["open_slot"].clone())?;
        Ok((item, slot))
    }

    async fn create_open_slot(&self, slot: OpenSlot) -> SchedulingResult<OpenSlot> {
        let body = serde_json::to_value(&slot)
            .map_err(|e| SchedulingError::InvalidInput(format!("open slot does not serialize: {}", e)))?;
        let rows = self
            .supabase
            .request_returning(Method::POST, "/rest/v1/open_slots", Some(body))
            .await
            .map_err(map_store_error)?;
        decode_rows::<OpenSlot>(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("insert returned no row".to_string()))
    }

    async fn read_open_slot(&self, id: Uuid) -> SchedulingResult<Option<OpenSlot>> {
        let path = format!("/rest/v1/open_slots?id=eq.{}", id);
        self.get_first(&path).await
    }

    async fn list_open_slots(&self, department_id: Uuid) -> SchedulingResult<Vec<OpenSlot>> {
        let path = format!(
            "/rest/v1/open_slots?department_id=eq.{}&order=appointment_at.asc,created_at.asc",
            department_id
        );
        self.get_rows(&path).await
    }

    async fn record_declined_offer(&self, id: Uuid, ticket: &str) -> SchedulingResult<Option<OpenSlot>> {
        let result: Value = self
            .supabase
            .rpc("decline_open_slot_offer", json!({ "p_open_slot_id": id, "p_ticket": ticket }))
            .await
            .map_err(map_store_error)?;
        if result.is_null() {
            return Ok(None);
        }
        decode_value(result).map(Some)
    }

    async fn claim_open_slot(&self, claim: SlotClaim) -> SchedulingResult<Option<ClaimedSlot>> {
        let args = json!({
            "p_open_slot_id": claim.open_slot_id,
            "p_ticket": claim.ticket,
            "p_expected_status": claim.expected_status,
            "p_expected_appointment_at": claim.expected_appointment_at,
            "p_new_status": claim.new_status,
            "p_vacated_slot": claim.vacated,
        });
        let result: Value = self
            .supabase
            .rpc("claim_open_slot", args)
            .await
            .map_err(map_store_error)?;

        if result.is_null() || result["slot"].is_null() {
            return Ok(None);
        }

        Ok(Some(ClaimedSlot {
            slot: decode_value(result["slot"].clone())?,
            item: decode_value(result["item"].clone())?,
            vacated: decode_value(result["vacated_slot"].clone())?,
        }))
    }

    async fn delete_open_slot(&self, id: Uuid) -> SchedulingResult<bool> {
        let path = format!("/rest/v1/open_slots?id=eq.{}", id);
        let rows = self
            .supabase
            .request_returning(Method::DELETE, &path, None)
            .await
            .map_err(map_store_error)?;
        Ok(!rows.is_empty())
    }

    async fn list_completed_durations(
        &self,
        department_id: Uuid,
        doctor_id: Option<Uuid>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> SchedulingResult<Vec<ConsultationSample>> {
        let mut path = format!(
            "/rest/v1/queue_items?department_id=eq.{}&status=eq.completed&consultation_started_at=not.is.null&consultation_completed_at=gte.{}&select=consultation_started_at,consultation_completed_at&order=consultation_completed_at.desc&limit={}",
            department_id,
            timestamp(since),
            limit
        );
        if let Some(doctor) = doctor_id {
            path.push_str(&format!("&assigned_doctor_id=eq.{}", doctor));
        }
        self.get_rows(&path).await
    }

    async fn list_booking_requests(
        &self,
        department_id: Option<Uuid>,
        status: BookingRequestStatus,
        on_or_before: NaiveDate,
    ) -> SchedulingResult<Vec<BookingRequest>> {
        let mut path = format!(
            "/rest/v1/booking_requests?status=eq.{}&requested_date=lte.{}&order=requested_date.asc,requested_time.asc",
            status.as_str(),
            on_or_before
        );
        if let Some(department) = department_id {
            path.push_str(&format!("&department_id=eq.{}", department));
        }
        self.get_rows(&path).await
    }

    async fn update_booking_request_status(
        &self,
        id: Uuid,
        status: BookingRequestStatus,
        expected_previous: BookingRequestStatus,
    ) -> SchedulingResult<BookingRequest> {
        let path = format!(
            "/rest/v1/booking_requests?id=eq.{}&status=eq.{}",
            id,
            expected_previous.as_str()
        );
        let rows = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(json!({ "status": status })))
            .await
            .map_err(map_store_error)?;

        if let Some(request) = decode_rows::<BookingRequest>(rows)?.into_iter().next() {
            return Ok(request);
        }

        let current: Option<BookingRequest> = self
            .get_first(&format!("/rest/v1/booking_requests?id=eq.{}", id))
            .await?;
        Err(match current {
            Some(request) => SchedulingError::Conflict(format!(
                "booking request {} is now {}",
                id,
                request.status.as_str()
            )),
            None => SchedulingError::NotFound(format!("booking request {}", id)),
        })
    }
}
