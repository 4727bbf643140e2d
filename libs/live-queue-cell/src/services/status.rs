use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use shared_database::{ClinicStore, StatusUpdate};
use shared_models::{QueueItem, QueueStatus, SchedulingError, SchedulingResult};
use shared_utils::{Clock, ClinicState};

/// Works out the write a move to `target` needs. `None` means the item is already there.
///
/// This is the only place consultation timestamps are decided.
pub fn plan_transition(item: &QueueItem, target: QueueStatus, now: DateTime<Utc>) -> Option<StatusUpdate> {
    if item.status == target {
        return None;
    }

    let (consultation_started_at, consultation_completed_at) = match target {
        QueueStatus::InConsultation => (Some(now), None),
        QueueStatus::Completed => (item.consultation_started_at.or(Some(now)), Some(now)),
        _ => (item.consultation_started_at, item.consultation_completed_at),
    };

    Some(StatusUpdate {
        status: target,
        consultation_started_at,
        consultation_completed_at,
    })
}

pub struct QueueStatusService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl QueueStatusService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    pub async fn transition(&self, ticket: &str, raw_status: &str) -> SchedulingResult<QueueItem> {
        let target = QueueStatus::normalize(raw_status)?;
        self.transition_to(ticket, target).await
    }

    /// Conditional on the status read here; a concurrent move surfaces as `Conflict`.
    pub async fn transition_to(&self, ticket: &str, target: QueueStatus) -> SchedulingResult<QueueItem> {
        let item = self
            .store
            .read_queue_item(ticket)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("ticket {}", ticket)))?;

        let Some(update) = plan_transition(&item, target, self.clock.now()) else {
            debug!("Ticket {} already {}", ticket, target);
            return Ok(item);
        };

        let previous = item.status;
        let updated = self.store.update_queue_item_status(ticket, update, previous).await?;
        info!("Ticket {} moved from {} to {}", ticket, previous, updated.status);
        Ok(updated)
    }
}
