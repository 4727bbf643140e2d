use std::sync::Arc;
use axum::{
    Router,
    routing::{get, post},
};

use shared_utils::ClinicState;
use crate::handlers::{
    get_wait_estimate,
    update_ticket_status,
    report_no_show,
    get_queue_board,
    get_position_estimate,
    get_average_duration,
    list_open_slots,
    get_next_candidate,
    resolve_offer,
    list_walk_in_candidates,
    assign_to_walk_in,
};

pub fn live_queue_routes(state: Arc<ClinicState>) -> Router {
    Router::new()
        .route("/tickets/{ticket}/wait", get(get_wait_estimate))
        .route("/tickets/{ticket}/status", post(update_ticket_status))
        .route("/tickets/{ticket}/no-show", post(report_no_show))
        .route("/departments/{department_id}/board", get(get_queue_board))
        .route("/departments/{department_id}/wait", get(get_position_estimate))
        .route("/departments/{department_id}/average-duration", get(get_average_duration))
        .route("/departments/{department_id}/open-slots", get(list_open_slots))
        .route("/open-slots/{slot_id}/candidate", get(get_next_candidate))
        .route("/open-slots/{slot_id}/offers", post(resolve_offer))
        .route("/open-slots/{slot_id}/walk-ins", get(list_walk_in_candidates))
        .route("/open-slots/{slot_id}/assign", post(assign_to_walk_in))
        .with_state(state)
}
