use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulingError;

// ==============================================================================
// DEPARTMENTS & WEEKS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub default_slot_interval_minutes: i32,
}

pub const MIN_SLOT_INTERVAL_MINUTES: i64 = 5;
pub const MAX_SLOT_INTERVAL_MINUTES: i64 = 60;
const SLOT_INTERVAL_STEP: i64 = 5;

/// Canonical slot cadence: clamped to 5..=60 and rounded to the nearest multiple of 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotInterval(i32);

impl SlotInterval {
    pub fn normalize(raw_minutes: i64) -> Self {
        let clamped = raw_minutes.clamp(MIN_SLOT_INTERVAL_MINUTES, MAX_SLOT_INTERVAL_MINUTES);
        let rounded = (clamped + SLOT_INTERVAL_STEP / 2) / SLOT_INTERVAL_STEP * SLOT_INTERVAL_STEP;
        SlotInterval(rounded as i32)
    }

    pub fn minutes(&self) -> i32 {
        self.0
    }
}

impl Department {
    pub fn default_interval(&self) -> SlotInterval {
        SlotInterval::normalize(self.default_slot_interval_minutes as i64)
    }
}

/// Per-department override for one Monday-aligned week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekAvailability {
    pub department_id: Uuid,
    pub week_start_date: NaiveDate,
    pub slot_interval_minutes: i32,
    pub is_open: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WeekAvailability {
    pub fn interval(&self) -> SlotInterval {
        SlotInterval::normalize(self.slot_interval_minutes as i64)
    }
}

/// The seven clinic-local days of a week plus the UTC instants bounding them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub week_start: NaiveDate,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl WeekWindow {
    pub fn last_day(&self) -> NaiveDate {
        self.week_start + Duration::days(6)
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.week_start && date <= self.last_day()
    }

    pub fn contains_instant(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at && at < self.ends_at
    }

    /// One window running from the start of `self` to the end of `last`.
    pub fn through(&self, last: &WeekWindow) -> WeekSpan {
        WeekSpan {
            first_day: self.week_start,
            last_day: last.last_day(),
            starts_at: self.starts_at,
            ends_at: last.ends_at,
        }
    }
}

/// Consecutive weeks read in one go; both day bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekSpan {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<WeekWindow> for WeekSpan {
    fn from(window: WeekWindow) -> Self {
        window.through(&window)
    }
}

/// Where the bookings of a span fall: requested dates and checked-in appointment instants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFootprint {
    pub requested_dates: Vec<NaiveDate>,
    pub appointments: Vec<DateTime<Utc>>,
}

impl BookingFootprint {
    pub fn touches(&self, window: &WeekWindow) -> bool {
        self.requested_dates.iter().any(|d| window.contains_date(*d))
            || self.appointments.iter().any(|at| window.contains_instant(*at))
    }
}

// ==============================================================================
// BOOKING REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingRequestStatus {
    Pending,
    Confirmed,
    Rejected,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl BookingRequestStatus {
    /// Requests in these states hold a claim on their week.
    pub fn holds_week(&self) -> bool {
        matches!(self, BookingRequestStatus::Pending | BookingRequestStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingRequestStatus::Pending => "pending",
            BookingRequestStatus::Confirmed => "confirmed",
            BookingRequestStatus::Rejected => "rejected",
            BookingRequestStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRequest {
    pub id: Uuid,
    pub department_id: Uuid,
    pub requested_date: NaiveDate,
    pub requested_time: NaiveTime,
    pub status: BookingRequestStatus,
    pub preferred_doctor_id: Option<Uuid>,
    pub beneficiary_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// QUEUE ITEMS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueSource {
    Booked,
    #[serde(alias = "walk-in", alias = "walkin")]
    WalkIn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    #[default]
    Normal,
    Urgent,
}

impl QueuePriority {
    /// Lower ranks are served first.
    pub fn rank(&self) -> u8 {
        match self {
            QueuePriority::Urgent => 0,
            QueuePriority::Normal => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Scheduled,
    Called,
    #[serde(alias = "in_progress", alias = "in progress", alias = "in consultation")]
    InConsultation,
    #[serde(alias = "done")]
    Completed,
    #[serde(alias = "no show")]
    NoShow,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl QueueStatus {
    pub const ACTIVE: [QueueStatus; 4] = [
        QueueStatus::Waiting,
        QueueStatus::Scheduled,
        QueueStatus::Called,
        QueueStatus::InConsultation,
    ];

    /// Folds the spellings front-desk tools send into the canonical status.
    /// An empty value means the item has just been placed in the queue.
    pub fn normalize(raw: &str) -> Result<Self, SchedulingError> {
        let folded = raw
            .trim()
            .to_ascii_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");

        match folded.as_str() {
            "" | "waiting" => Ok(QueueStatus::Waiting),
            "scheduled" => Ok(QueueStatus::Scheduled),
            "called" => Ok(QueueStatus::Called),
            "in_consultation" | "in_progress" => Ok(QueueStatus::InConsultation),
            "completed" | "done" => Ok(QueueStatus::Completed),
            "no_show" | "noshow" => Ok(QueueStatus::NoShow),
            "cancelled" | "canceled" => Ok(QueueStatus::Cancelled),
            _ => Err(SchedulingError::InvalidInput(format!("unknown queue status '{}'", raw))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Scheduled => "scheduled",
            QueueStatus::Called => "called",
            QueueStatus::InConsultation => "in_consultation",
            QueueStatus::Completed => "completed",
            QueueStatus::NoShow => "no_show",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    /// Counted when estimating queue position.
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Still waiting for a consultation to begin.
    pub fn is_pre_consultation(&self) -> bool {
        matches!(self, QueueStatus::Waiting | QueueStatus::Scheduled)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueStatus::normalize(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub ticket: String,
    pub source: QueueSource,
    #[serde(default)]
    pub priority: QueuePriority,
    pub status: QueueStatus,
    pub department_id: Uuid,
    pub assigned_doctor_id: Option<Uuid>,
    pub appointment_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub consultation_started_at: Option<DateTime<Utc>>,
    pub consultation_completed_at: Option<DateTime<Utc>>,
    pub booking_request_id: Option<Uuid>,
}

impl QueueItem {
    pub fn is_booked(&self) -> bool {
        self.source == QueueSource::Booked
    }

    pub fn is_walk_in(&self) -> bool {
        self.source == QueueSource::WalkIn
    }

    /// Booked and still claiming its appointment time; cancelled and no-show items have let it go.
    pub fn holds_booking(&self) -> bool {
        self.is_booked() && !matches!(self.status, QueueStatus::Cancelled | QueueStatus::NoShow)
    }
}

/// Start/complete pair of one finished consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultationSample {
    pub consultation_started_at: DateTime<Utc>,
    pub consultation_completed_at: DateTime<Utc>,
}

// ==============================================================================
// OPEN SLOTS
// ==============================================================================

/// An appointment time vacated by a no-show, waiting for a taker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenSlot {
    pub id: Uuid,
    pub department_id: Uuid,
    pub appointment_at: DateTime<Utc>,
    pub freed_from_ticket: String,
    #[serde(default)]
    pub offered_to_tickets: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl OpenSlot {
    pub fn new(
        department_id: Uuid,
        appointment_at: DateTime<Utc>,
        freed_from_ticket: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            department_id,
            appointment_at,
            freed_from_ticket: freed_from_ticket.to_string(),
            offered_to_tickets: Vec::new(),
            created_at: now,
        }
    }

    pub fn was_declined_by(&self, ticket: &str) -> bool {
        self.offered_to_tickets.iter().any(|t| t == ticket)
    }
}
