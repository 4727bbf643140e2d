use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::ClinicStore;
use shared_models::{error::AppError, QueueStatus, SchedulingError};
use shared_utils::ClinicState;

use crate::models::{AssignRequest, DoctorQuery, OfferRequest, PositionQuery, StatusChangeRequest};
use crate::services::{
    eta::WaitEstimator,
    reclamation::{frees_slot, SlotReclamationService},
    status::QueueStatusService,
};

/// Wait estimate for one ticket
pub async fn get_wait_estimate(
    State(state): State<Arc<ClinicState>>,
    Path(ticket): Path<String>,
) -> Result<Json<Value>, AppError> {
    let estimator = WaitEstimator::new(&state);
    let estimate = estimator.wait_estimate(&ticket).await?;

    Ok(Json(json!(estimate)))
}

/// Move a ticket through the consultation lifecycle
pub async fn update_ticket_status(
    State(state): State<Arc<ClinicState>>,
    Path(ticket): Path<String>,
    Json(request): Json<StatusChangeRequest>,
) -> Result<Json<Value>, AppError> {
    let target = QueueStatus::normalize(&request.status)?;
    info!("Status change for ticket {} to {}", ticket, target);

    // A booked no-show must open its slot, so it goes through reclamation
    if target == QueueStatus::NoShow {
        let item = state
            .store
            .read_queue_item(&ticket)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("ticket {}", ticket)))?;

        if frees_slot(&item) && item.status != QueueStatus::NoShow {
            let report = SlotReclamationService::new(&state).report_no_show(&ticket).await?;
            return Ok(Json(json!({
                "item": report.item,
                "open_slot": report.open_slot
            })));
        }
    }

    let service = QueueStatusService::new(&state);
    let item = service.transition_to(&ticket, target).await?;

    Ok(Json(json!({
        "item": item,
        "open_slot": null
    })))
}

/// Report a booked patient as a no-show
pub async fn report_no_show(
    State(state): State<Arc<ClinicState>>,
    Path(ticket): Path<String>,
) -> Result<Json<Value>, AppError> {
    info!("No-show reported for ticket {}", ticket);

    let service = SlotReclamationService::new(&state);
    let report = service.report_no_show(&ticket).await?;

    Ok(Json(json!(report)))
}

/// Live queue board for a department
pub async fn get_queue_board(
    State(state): State<Arc<ClinicState>>,
    Path(department_id): Path<Uuid>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let estimator = WaitEstimator::new(&state);
    let board = estimator.queue_board(department_id, query.doctor_id).await?;

    Ok(Json(json!(board)))
}

pub async fn get_position_estimate(
    State(state): State<Arc<ClinicState>>,
    Path(department_id): Path<Uuid>,
    Query(query): Query<PositionQuery>,
) -> Result<Json<Value>, AppError> {
    let estimator = WaitEstimator::new(&state);
    let estimate = estimator
        .estimate_for_position(department_id, query.position, query.doctor_id)
        .await?;

    Ok(Json(json!(estimate)))
}

pub async fn get_average_duration(
    State(state): State<Arc<ClinicState>>,
    Path(department_id): Path<Uuid>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let estimator = WaitEstimator::new(&state);
    let average = estimator.average_consultation(department_id, query.doctor_id).await?;

    Ok(Json(json!({
        "department_id": department_id,
        "doctor_id": query.doctor_id,
        "average": average
    })))
}

/// Outstanding open slots for a department
pub async fn list_open_slots(
    State(state): State<Arc<ClinicState>>,
    Path(department_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotReclamationService::new(&state);
    let slots = service.list_open_slots(department_id).await?;

    Ok(Json(json!({
        "department_id": department_id,
        "open_slots": slots
    })))
}

/// Who should be offered the slot next
pub async fn get_next_candidate(
    State(state): State<Arc<ClinicState>>,
    Path(slot_id): Path<Uuid>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let service = SlotReclamationService::new(&state);
    let candidate = service.next_candidate(slot_id, query.doctor_id).await?;

    Ok(Json(json!({
        "open_slot_id": slot_id,
        "candidate": candidate,
        "walk_in_fallback": candidate.is_none()
    })))
}

/// Accept or decline an offered slot
pub async fn resolve_offer(
    State(state): State<Arc<ClinicState>>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<OfferRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Ticket {} answered offer for slot {}: {:?}", request.ticket, slot_id, request.decision);

    let service = SlotReclamationService::new(&state);
    let outcome = service
        .resolve_offer(slot_id, &request.ticket, request.decision, request.doctor_id)
        .await?;

    Ok(Json(json!(outcome)))
}

pub async fn list_walk_in_candidates(
    State(state): State<Arc<ClinicState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SlotReclamationService::new(&state);
    let candidates = service.walk_in_candidates(slot_id).await?;

    Ok(Json(json!({
        "open_slot_id": slot_id,
        "candidates": candidates
    })))
}

/// Hand an exhausted slot to a walk-in
pub async fn assign_to_walk_in(
    State(state): State<Arc<ClinicState>>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SlotReclamationService::new(&state);
    let assignment = service
        .assign_to_walk_in(slot_id, &request.ticket, request.allow_cross_department, request.doctor_id)
        .await?;

    Ok(Json(json!(assignment)))
}
