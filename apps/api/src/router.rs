use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use live_queue_cell::router::live_queue_routes;
use shared_utils::ClinicState;
use slot_availability_cell::router::slot_availability_routes;

pub fn create_router(state: Arc<ClinicState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic queue API is running!" }))
        .nest("/scheduling", slot_availability_routes(state.clone()))
        .nest("/queue", live_queue_routes(state))
}
