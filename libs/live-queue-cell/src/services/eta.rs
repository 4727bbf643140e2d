use std::sync::Arc;

use chrono::Duration;
use tracing::debug;
use uuid::Uuid;

use shared_database::ClinicStore;
use shared_models::{ConsultationSample, QueueItem, SchedulingError, SchedulingResult};
use shared_utils::{Clock, ClinicState};

use crate::models::{AverageBasis, AverageDuration, BoardEntry, PositionEstimate, QueueBoard, WaitEstimate};
use crate::services::ordering::sort_queue;

pub const DEFAULT_CONSULTATION_MINUTES: i64 = 10;
pub const DURATION_LOOKBACK_DAYS: i64 = 30;
pub const MAX_DURATION_SAMPLES: usize = 200;
pub const MIN_VALID_DURATION_MINUTES: i64 = 1;
pub const MAX_VALID_DURATION_MINUTES: i64 = 180;

/// Consultation length rounded to whole minutes.
pub fn sample_minutes(sample: &ConsultationSample) -> i64 {
    let seconds = (sample.consultation_completed_at - sample.consultation_started_at).num_seconds();
    (seconds as f64 / 60.0).round() as i64
}

/// Rounded mean of the plausible samples and how many were used.
/// Expects samples most recent first.
pub fn average_minutes(samples: &[ConsultationSample]) -> Option<(i64, usize)> {
    let valid: Vec<i64> = samples
        .iter()
        .map(sample_minutes)
        .filter(|m| (MIN_VALID_DURATION_MINUTES..=MAX_VALID_DURATION_MINUTES).contains(m))
        .take(MAX_DURATION_SAMPLES)
        .collect();

    if valid.is_empty() {
        return None;
    }
    let mean = valid.iter().sum::<i64>() as f64 / valid.len() as f64;
    Some(((mean.round() as i64).max(1), valid.len()))
}

pub fn estimate_minutes(waiting_ahead: usize, average_minutes: i64) -> i64 {
    ((waiting_ahead as f64) * (average_minutes as f64)).round().max(0.0) as i64
}

pub fn format_eta(minutes: i64) -> String {
    match minutes {
        m if m <= 0 => "Now".to_string(),
        m if m < 60 => format!("{} min", m),
        m if m % 60 == 0 => format!("{} hr", m / 60),
        m => format!("{} hr {} min", m / 60, m % 60),
    }
}

/// 0-based index of `ticket` in the ordered active queue.
pub fn waiting_ahead(items: &[QueueItem], ticket: &str) -> Option<usize> {
    let mut active: Vec<QueueItem> = items.iter().filter(|i| i.status.is_active()).cloned().collect();
    sort_queue(&mut active);
    active.iter().position(|i| i.ticket == ticket)
}

pub struct WaitEstimator {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl WaitEstimator {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Doctor history wins when it has any valid sample, then the department, then the fixed default.
    pub async fn average_consultation(
        &self,
        department_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> SchedulingResult<AverageDuration> {
        let since = self.clock.now() - Duration::days(DURATION_LOOKBACK_DAYS);

        if let Some(doctor_id) = doctor_id {
            let samples = self
                .store
                .list_completed_durations(department_id, Some(doctor_id), since, MAX_DURATION_SAMPLES)
                .await?;
            if let Some((minutes, sample_count)) = average_minutes(&samples) {
                return Ok(AverageDuration {
                    minutes,
                    basis: AverageBasis::Doctor,
                    sample_count,
                });
            }
        }

        let samples = self
            .store
            .list_completed_durations(department_id, None, since, MAX_DURATION_SAMPLES)
            .await?;
        let average = match average_minutes(&samples) {
            Some((minutes, sample_count)) => AverageDuration {
                minutes,
                basis: AverageBasis::Department,
                sample_count,
            },
            None => AverageDuration {
                minutes: DEFAULT_CONSULTATION_MINUTES,
                basis: AverageBasis::Default,
                sample_count: 0,
            },
        };

        debug!(
            "Average consultation for department {}: {} min ({:?}, {} samples)",
            department_id, average.minutes, average.basis, average.sample_count
        );
        Ok(average)
    }

    pub async fn wait_estimate(&self, ticket: &str) -> SchedulingResult<WaitEstimate> {
        let item = self
            .store
            .read_queue_item(ticket)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("ticket {}", ticket)))?;

        let average = self
            .average_consultation(item.department_id, item.assigned_doctor_id)
            .await?;

        let ahead = if item.status.is_active() {
            let queue = self.store.list_active_queue_items(item.department_id, None).await?;
            waiting_ahead(&queue, ticket)
        } else {
            None
        };
        let eta_minutes = ahead.map_or(0, |n| estimate_minutes(n, average.minutes));

        Ok(WaitEstimate {
            ticket: item.ticket,
            department_id: item.department_id,
            status: item.status,
            waiting_ahead: ahead,
            eta_minutes,
            eta_label: format_eta(eta_minutes),
            average_minutes: average.minutes,
            basis: average.basis,
        })
    }

    pub async fn estimate_for_position(
        &self,
        department_id: Uuid,
        position: usize,
        doctor_id: Option<Uuid>,
    ) -> SchedulingResult<PositionEstimate> {
        let average = self.average_consultation(department_id, doctor_id).await?;
        let eta_minutes = estimate_minutes(position, average.minutes);

        Ok(PositionEstimate {
            department_id,
            doctor_id,
            waiting_ahead: position,
            eta_minutes,
            eta_label: format_eta(eta_minutes),
            average_minutes: average.minutes,
            basis: average.basis,
        })
    }

    pub async fn queue_board(&self, department_id: Uuid, doctor_id: Option<Uuid>) -> SchedulingResult<QueueBoard> {
        let average = self.average_consultation(department_id, doctor_id).await?;
        let mut queue = self.store.list_active_queue_items(department_id, doctor_id).await?;
        sort_queue(&mut queue);

        let entries = queue
            .into_iter()
            .enumerate()
            .map(|(ahead, item)| {
                let eta_minutes = estimate_minutes(ahead, average.minutes);
                BoardEntry {
                    ticket: item.ticket,
                    source: item.source,
                    priority: item.priority,
                    status: item.status,
                    assigned_doctor_id: item.assigned_doctor_id,
                    appointment_at: item.appointment_at,
                    added_at: item.added_at,
                    waiting_ahead: ahead,
                    eta_minutes,
                    eta_label: format_eta(eta_minutes),
                }
            })
            .collect();

        Ok(QueueBoard {
            department_id,
            doctor_id,
            average_minutes: average.minutes,
            basis: average.basis,
            entries,
        })
    }
}
