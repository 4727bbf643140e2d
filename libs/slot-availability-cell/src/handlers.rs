use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::{error::AppError, SchedulingError};
use shared_utils::ClinicState;

use crate::models::{
    CalendarQuery, ExpireRequest, SetWeekRequest, SlotCalendar, SlotsQuery, ValidateSlotQuery,
    WeekOverviewQuery,
};
use crate::services::{
    booking_expiry::BookingExpiryService,
    calendar::{generate_slots, normalize_interval, parse_slot_time},
    week::WeekAvailabilityService,
};

fn parse_date(raw: &str) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| SchedulingError::InvalidInput(format!("'{}' is not a valid YYYY-MM-DD date", raw)))
}

/// Slot times for an interval, without any department context
pub async fn get_calendar(Query(query): Query<CalendarQuery>) -> Result<Json<Value>, AppError> {
    let raw = query
        .interval_minutes
        .ok_or_else(|| AppError::BadRequest("interval_minutes is required".to_string()))?;

    let calendar = SlotCalendar {
        interval_minutes: normalize_interval(raw).minutes(),
        slots: generate_slots(raw),
    };

    Ok(Json(json!(calendar)))
}

/// Bookable slots for a department on a date
pub async fn get_bookable_slots(
    State(state): State<Arc<ClinicState>>,
    Path(department_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&query.date)?;

    let service = WeekAvailabilityService::new(&state);
    let slots = service.bookable_slots(department_id, date).await?;

    Ok(Json(json!(slots)))
}

/// Check one requested date and time against the department calendar
pub async fn validate_slot(
    State(state): State<Arc<ClinicState>>,
    Path(department_id): Path<Uuid>,
    Query(query): Query<ValidateSlotQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&query.date)?;
    let time = parse_slot_time(&query.time)?;

    let service = WeekAvailabilityService::new(&state);
    let slot = service.validate_slot(department_id, date, time).await?;

    Ok(Json(json!({
        "valid": true,
        "slot": slot
    })))
}

/// Week planner for staff screens
pub async fn get_week_overview(
    State(state): State<Arc<ClinicState>>,
    Path(department_id): Path<Uuid>,
    Query(query): Query<WeekOverviewQuery>,
) -> Result<Json<Value>, AppError> {
    let service = WeekAvailabilityService::new(&state);
    let weeks = service
        .week_overview(department_id, query.weeks.unwrap_or(4))
        .await?;

    Ok(Json(json!({
        "department_id": department_id,
        "current_week_start": service.current_week_start(),
        "weeks": weeks
    })))
}

/// Open, close or re-cadence one week
pub async fn set_week_availability(
    State(state): State<Arc<ClinicState>>,
    Path((department_id, week_start)): Path<(Uuid, String)>,
    Json(request): Json<SetWeekRequest>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&week_start)?;
    info!(
        "Set week request for department {} week of {}: open={} interval={}",
        department_id, date, request.is_open, request.slot_interval_minutes
    );

    let service = WeekAvailabilityService::new(&state);
    let saved = service
        .set_week(department_id, date, request.slot_interval_minutes, request.is_open)
        .await?;

    Ok(Json(json!(saved)))
}

/// Cancel pending requests that missed the morning approval cut-off
pub async fn expire_booking_requests(
    State(state): State<Arc<ClinicState>>,
    Json(request): Json<ExpireRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingExpiryService::new(&state);
    let cancelled = service.expire_stale_requests(request.department_id).await?;

    Ok(Json(json!({
        "cancelled_count": cancelled.len(),
        "cancelled": cancelled
    })))
}
