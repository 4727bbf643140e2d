use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{OpenSlot, QueueItem, QueuePriority, QueueSource, QueueStatus};

// ==============================================================================
// WAIT ESTIMATES
// ==============================================================================

/// Which history produced an average consultation length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AverageBasis {
    Doctor,
    Department,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AverageDuration {
    pub minutes: i64,
    pub basis: AverageBasis,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitEstimate {
    pub ticket: String,
    pub department_id: Uuid,
    pub status: QueueStatus,
    /// `None` once the ticket has left the active queue.
    pub waiting_ahead: Option<usize>,
    pub eta_minutes: i64,
    pub eta_label: String,
    pub average_minutes: i64,
    pub basis: AverageBasis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionEstimate {
    pub department_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub waiting_ahead: usize,
    pub eta_minutes: i64,
    pub eta_label: String,
    pub average_minutes: i64,
    pub basis: AverageBasis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardEntry {
    pub ticket: String,
    pub source: QueueSource,
    pub priority: QueuePriority,
    pub status: QueueStatus,
    pub assigned_doctor_id: Option<Uuid>,
    pub appointment_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub waiting_ahead: usize,
    pub eta_minutes: i64,
    pub eta_label: String,
}

/// Live display of one department's active queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueBoard {
    pub department_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub average_minutes: i64,
    pub basis: AverageBasis,
    pub entries: Vec<BoardEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PositionQuery {
    pub position: usize,
    pub doctor_id: Option<Uuid>,
}

// ==============================================================================
// STATUS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    #[serde(default)]
    pub status: String,
}

// ==============================================================================
// SLOT RECLAMATION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoShowReport {
    pub item: QueueItem,
    pub open_slot: OpenSlot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferDecision {
    Accept,
    Decline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRequest {
    pub ticket: String,
    pub decision: OfferDecision,
    /// On-duty doctor of the view making the offer; limits who is offered next.
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OfferOutcome {
    Accepted {
        slot: OpenSlot,
        item: QueueItem,
        /// Opened for the time the accepting patient gave up.
        vacated: Option<OpenSlot>,
    },
    Declined {
        slot: OpenSlot,
        next_candidate: Option<QueueItem>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalkInCandidate {
    pub item: QueueItem,
    pub cross_department: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub ticket: String,
    #[serde(default)]
    pub allow_cross_department: bool,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalkInAssignment {
    pub slot: OpenSlot,
    pub item: QueueItem,
    pub cross_department: bool,
    pub vacated: Option<OpenSlot>,
}
