use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// SLOT QUERIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotCalendar {
    pub interval_minutes: i32,
    pub slots: Vec<String>,
}

/// Answer to "which times can be booked on this date".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookableSlots {
    pub department_id: Uuid,
    pub date: NaiveDate,
    pub week_start: NaiveDate,
    pub slots: Vec<String>,
    pub interval_minutes: i32,
    pub is_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedSlot {
    pub department_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub appointment_at: DateTime<Utc>,
    pub interval_minutes: i32,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub interval_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateSlotQuery {
    pub date: String,
    pub time: String,
}

// ==============================================================================
// WEEK AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWeekRequest {
    pub slot_interval_minutes: i64,
    pub is_open: bool,
}

#[derive(Debug, Deserialize)]
pub struct WeekOverviewQuery {
    pub weeks: Option<u32>,
}

/// One row of the staff week planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub is_open: bool,
    pub slot_interval_minutes: i32,
    /// A stored row exists for this week.
    pub explicit: bool,
    pub has_bookings: bool,
}

// ==============================================================================
// BOOKING REQUEST EXPIRY
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpireRequest {
    pub department_id: Option<Uuid>,
}
