use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{ClinicStore, WeekWriteGuard};
use shared_models::{
    Department, SchedulingError, SchedulingResult, SlotInterval, Unavailable, WeekAvailability,
    WeekWindow,
};
use shared_utils::{Clock, ClinicState};

use crate::models::{BookableSlots, ValidatedSlot, WeekSummary};
use crate::services::calendar::{format_slot, generate_slot_times, is_slot, normalize_interval};

pub const MAX_OVERVIEW_WEEKS: u32 = 12;

/// Monday of the week containing `date`. Sunday belongs to the week that started six days earlier.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// UTC instant of a clinic-local wall-clock time.
pub fn local_instant(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    (date.and_time(time) - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

pub fn week_window(week_start: NaiveDate, offset: FixedOffset) -> WeekWindow {
    WeekWindow {
        week_start,
        starts_at: local_instant(week_start, NaiveTime::MIN, offset),
        ends_at: local_instant(week_start + Duration::days(7), NaiveTime::MIN, offset),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStanding {
    Past,
    Current,
    Future,
}

/// Where a week stands relative to now and what the store says about it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekResolution {
    pub department: Department,
    pub week_start: NaiveDate,
    pub standing: WeekStanding,
    pub row: Option<WeekAvailability>,
    pub interval: SlotInterval,
    pub is_open: bool,
}

impl WeekResolution {
    fn new(department: Department, week_start: NaiveDate, current: NaiveDate, row: Option<WeekAvailability>) -> Self {
        let standing = match week_start.cmp(&current) {
            std::cmp::Ordering::Less => WeekStanding::Past,
            std::cmp::Ordering::Equal => WeekStanding::Current,
            std::cmp::Ordering::Greater => WeekStanding::Future,
        };
        let interval = row
            .as_ref()
            .map(|r| r.interval())
            .unwrap_or_else(|| department.default_interval());
        let is_open = match standing {
            WeekStanding::Past => false,
            // The current week needs no row; only an explicit close shuts it.
            WeekStanding::Current => row.as_ref().map_or(true, |r| r.is_open),
            WeekStanding::Future => row.as_ref().is_some_and(|r| r.is_open),
        };

        Self {
            department,
            week_start,
            standing,
            row,
            interval,
            is_open,
        }
    }

    /// Why the week refuses bookings, if it does.
    pub fn unavailable_reason(&self) -> Option<Unavailable> {
        match (self.standing, &self.row) {
            (WeekStanding::Past, _) => Some(Unavailable::PastWeek),
            _ if self.is_open => None,
            (WeekStanding::Future, None) => Some(Unavailable::WeekNotOpen),
            _ => Some(Unavailable::WeekClosed),
        }
    }
}

/// Gatekeeper for which weeks accept bookings and at what cadence.
pub struct WeekAvailabilityService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl WeekAvailabilityService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            offset: state.clinic_offset(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        local_today(self.clock.now(), self.offset)
    }

    pub fn current_week_start(&self) -> NaiveDate {
        week_start_for(self.today())
    }

    async fn department(&self, department_id: Uuid) -> SchedulingResult<Department> {
        self.store
            .read_department(department_id)
            .await?
            .ok_or_else(|| SchedulingError::InvalidInput(format!("unknown department {}", department_id)))
    }

    pub async fn resolve_week(&self, department_id: Uuid, date: NaiveDate) -> SchedulingResult<WeekResolution> {
        let department = self.department(department_id).await?;
        let week_start = week_start_for(date);
        let row = self.store.read_week_availability(department_id, week_start).await?;

        let resolution = WeekResolution::new(department, week_start, self.current_week_start(), row);
        debug!(
            "Week {} for department {}: {:?}, open={}, interval={}",
            week_start,
            department_id,
            resolution.standing,
            resolution.is_open,
            resolution.interval.minutes()
        );
        Ok(resolution)
    }

    /// Resolves the week of `date` and fails unless it accepts bookings.
    pub async fn ensure_bookable(&self, department_id: Uuid, date: NaiveDate) -> SchedulingResult<WeekResolution> {
        let resolution = self.resolve_week(department_id, date).await?;
        match resolution.unavailable_reason() {
            Some(reason) => Err(SchedulingError::NotAvailable(reason)),
            None => Ok(resolution),
        }
    }

    /// Slots still bookable on `date`. A week that is not open answers with no slots rather than an error.
    pub async fn bookable_slots(&self, department_id: Uuid, date: NaiveDate) -> SchedulingResult<BookableSlots> {
        let resolution = self.resolve_week(department_id, date).await?;

        if resolution.standing == WeekStanding::Past {
            return Err(SchedulingError::NotAvailable(Unavailable::PastWeek));
        }
        let today = self.today();
        if date < today {
            return Err(SchedulingError::NotAvailable(Unavailable::PastDate));
        }

        let slots = if resolution.is_open {
            let now = self.clock.now();
            generate_slot_times(resolution.interval)
                .into_iter()
                .filter(|t| date > today || local_instant(date, *t, self.offset) > now)
                .map(format_slot)
                .collect()
        } else {
            Vec::new()
        };

        Ok(BookableSlots {
            department_id,
            date,
            week_start: resolution.week_start,
            slots,
            interval_minutes: resolution.interval.minutes(),
            is_open: resolution.is_open,
        })
    }

    pub async fn validate_slot(
        &self,
        department_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> SchedulingResult<ValidatedSlot> {
        let resolution = self.ensure_bookable(department_id, date).await?;

        if date < self.today() {
            return Err(SchedulingError::NotAvailable(Unavailable::PastDate));
        }
        if !is_slot(time, resolution.interval) {
            return Err(SchedulingError::NotAvailable(Unavailable::SlotNotOffered));
        }
        let appointment_at = local_instant(date, time, self.offset);
        if appointment_at <= self.clock.now() {
            return Err(SchedulingError::NotAvailable(Unavailable::SlotInPast));
        }

        Ok(ValidatedSlot {
            department_id,
            date,
            time: format_slot(time),
            appointment_at,
            interval_minutes: resolution.interval.minutes(),
        })
    }

    /// Admin "set week". `date` may be any day of the target week.
    pub async fn set_week(
        &self,
        department_id: Uuid,
        date: NaiveDate,
        raw_interval_minutes: i64,
        is_open: bool,
    ) -> SchedulingResult<WeekAvailability> {
        self.department(department_id).await?;

        let week_start = week_start_for(date);
        let current = self.current_week_start();
        if week_start < current {
            warn!("Rejected change to past week {} for department {}", week_start, department_id);
            return Err(SchedulingError::NotAvailable(Unavailable::PastWeek));
        }

        let guard = if week_start == current {
            WeekWriteGuard::FreezeIfBooked(week_window(week_start, self.offset))
        } else {
            WeekWriteGuard::Unguarded
        };

        let row = WeekAvailability {
            department_id,
            week_start_date: week_start,
            slot_interval_minutes: normalize_interval(raw_interval_minutes).minutes(),
            is_open,
            updated_at: Some(self.clock.now()),
        };

        let saved = self.store.upsert_week_availability(row, guard).await?;
        info!(
            "Week {} for department {} set to open={} interval={}",
            saved.week_start_date, department_id, saved.is_open, saved.slot_interval_minutes
        );
        Ok(saved)
    }

    /// Current week plus the following ones, as the store resolves them.
    pub async fn week_overview(&self, department_id: Uuid, weeks: u32) -> SchedulingResult<Vec<WeekSummary>> {
        let department = self.department(department_id).await?;
        let weeks = weeks.clamp(1, MAX_OVERVIEW_WEEKS);
        let current = self.current_week_start();
        let last = current + Duration::weeks(weeks as i64 - 1);

        let rows = self.store.list_week_availability(department_id, current, last).await?;
        let span = week_window(current, self.offset).through(&week_window(last, self.offset));
        let footprint = self.store.booking_footprint(department_id, span).await?;

        let summaries = (0..weeks)
            .map(|n| {
                let week_start = current + Duration::weeks(n as i64);
                let row = rows.iter().find(|r| r.week_start_date == week_start).cloned();
                let explicit = row.is_some();
                let has_bookings = footprint.touches(&week_window(week_start, self.offset));
                let resolution = WeekResolution::new(department.clone(), week_start, current, row);

                WeekSummary {
                    week_start,
                    is_open: resolution.is_open,
                    slot_interval_minutes: resolution.interval.minutes(),
                    explicit,
                    has_bookings,
                }
            })
            .collect();
        Ok(summaries)
    }
}
