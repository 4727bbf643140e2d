use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use shared_database::ClinicStore;
use shared_models::{BookingRequest, BookingRequestStatus, SchedulingError, SchedulingResult};
use shared_utils::{Clock, ClinicState};

use crate::services::week::{local_instant, local_today};

/// Clinic-local hour by which a request for that day must have been approved.
pub const APPROVAL_CUTOFF_HOUR: u32 = 7;

/// Clinic-local `APPROVAL_CUTOFF_HOUR`:00 on the requested day.
pub fn approval_cutoff(requested_date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    local_instant(requested_date, NaiveTime::MIN, offset) + Duration::hours(APPROVAL_CUTOFF_HOUR as i64)
}

pub fn is_past_approval_cutoff(requested_date: NaiveDate, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    now >= approval_cutoff(requested_date, offset)
}

/// Cancels pending booking requests nobody approved in time.
pub struct BookingExpiryService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl BookingExpiryService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            offset: state.clinic_offset(),
        }
    }

    /// Returns the requests this call cancelled. A request that moved on
    /// concurrently (approved or cancelled by staff) is left alone.
    pub async fn expire_stale_requests(&self, department_id: Option<Uuid>) -> SchedulingResult<Vec<BookingRequest>> {
        let now = self.clock.now();
        let today = local_today(now, self.offset);

        let pending = self
            .store
            .list_booking_requests(department_id, BookingRequestStatus::Pending, today)
            .await?;

        let mut cancelled = Vec::new();
        for request in pending
            .into_iter()
            .filter(|r| is_past_approval_cutoff(r.requested_date, now, self.offset))
        {
            match self
                .store
                .update_booking_request_status(request.id, BookingRequestStatus::Cancelled, BookingRequestStatus::Pending)
                .await
            {
                Ok(updated) => {
                    info!(
                        "Auto-cancelled booking request {} for {} {}",
                        updated.id, updated.requested_date, updated.requested_time
                    );
                    cancelled.push(updated);
                }
                Err(SchedulingError::Conflict(reason)) => {
                    warn!("Skipped expiring booking request {}: {}", request.id, reason);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_is_seven_local() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();

        assert_eq!(approval_cutoff(day, plus_three).to_rfc3339(), "2025-03-12T04:00:00+00:00");

        let just_before = day.and_hms_opt(3, 59, 59).unwrap().and_utc();
        let on_time = day.and_hms_opt(4, 0, 0).unwrap().and_utc();
        assert!(!is_past_approval_cutoff(day, just_before, plus_three));
        assert!(is_past_approval_cutoff(day, on_time, plus_three));
    }

    #[test]
    fn test_cutoff_never_collapses_to_midnight() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();

        assert_eq!(approval_cutoff(day, utc).to_rfc3339(), "2025-03-12T07:00:00+00:00");
        assert_eq!(approval_cutoff(day, minus_five).to_rfc3339(), "2025-03-12T12:00:00+00:00");
        assert!(!is_past_approval_cutoff(day, day.and_hms_opt(6, 59, 0).unwrap().and_utc(), utc));
    }
}
