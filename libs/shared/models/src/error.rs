use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Available: {0}")]
    NotAvailable(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            AppError::NotAvailable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "not_available", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "database", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "error": message,
            "kind": kind
        }));

        (status, body).into_response()
    }
}

/// Why a date, week or slot cannot be used right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    PastWeek,
    PastDate,
    WeekNotOpen,
    WeekClosed,
    SlotNotOffered,
    SlotInPast,
    BookedCandidatesRemain,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Unavailable::PastWeek => "week is in the past and can no longer be changed or booked",
            Unavailable::PastDate => "date is in the past",
            Unavailable::WeekNotOpen => "week is not yet open for booking",
            Unavailable::WeekClosed => "week has been closed for booking",
            Unavailable::SlotNotOffered => "time is not one of the department's slots",
            Unavailable::SlotInPast => "slot time has already passed",
            Unavailable::BookedCandidatesRemain => "booked patients are still waiting to be offered this slot",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not available: {0}")]
    NotAvailable(Unavailable),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::InvalidInput(msg) => AppError::BadRequest(msg),
            SchedulingError::NotAvailable(reason) => AppError::NotAvailable(reason.to_string()),
            SchedulingError::Conflict(msg) => AppError::Conflict(msg),
            SchedulingError::NotFound(msg) => AppError::NotFound(msg),
            SchedulingError::Integrity(msg) => {
                tracing::error!("Store integrity violation: {}", msg);
                AppError::Internal("Unexpected scheduling failure".to_string())
            }
            SchedulingError::Database(msg) => AppError::Database(msg),
        }
    }
}
