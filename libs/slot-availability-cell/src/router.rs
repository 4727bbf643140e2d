use std::sync::Arc;
use axum::{
    Router,
    routing::{get, post, put},
};

use shared_utils::ClinicState;
use crate::handlers::{
    get_calendar,
    get_bookable_slots,
    validate_slot,
    get_week_overview,
    set_week_availability,
    expire_booking_requests,
};

pub fn slot_availability_routes(state: Arc<ClinicState>) -> Router {
    Router::new()
        .route("/calendar", get(get_calendar))
        .route("/departments/{department_id}/slots", get(get_bookable_slots))
        .route("/departments/{department_id}/slots/validate", get(validate_slot))
        .route("/departments/{department_id}/weeks", get(get_week_overview))
        .route("/departments/{department_id}/weeks/{week_start}", put(set_week_availability))
        .route("/booking-requests/expire", post(expire_booking_requests))
        .with_state(state)
}
