use chrono::{NaiveTime, Timelike};

use shared_models::{SchedulingError, SlotInterval};

/// A daily opening window, as minutes after midnight. Both ends are bookable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClinicWindow {
    pub start_minute: u32,
    pub end_minute: u32,
}

pub const MORNING_WINDOW: ClinicWindow = ClinicWindow {
    start_minute: 8 * 60,
    end_minute: 11 * 60 + 30,
};

pub const AFTERNOON_WINDOW: ClinicWindow = ClinicWindow {
    start_minute: 13 * 60,
    end_minute: 17 * 60,
};

pub const CLINIC_WINDOWS: [ClinicWindow; 2] = [MORNING_WINDOW, AFTERNOON_WINDOW];

/// The one place raw interval values become the canonical cadence.
pub fn normalize_interval(raw_minutes: i64) -> SlotInterval {
    SlotInterval::normalize(raw_minutes)
}

/// Slot start times for a day, in order, across both clinic windows.
pub fn generate_slot_times(interval: SlotInterval) -> Vec<NaiveTime> {
    let step = interval.minutes() as u32;

    CLINIC_WINDOWS
        .iter()
        .flat_map(|window| {
            (window.start_minute..=window.end_minute)
                .step_by(step as usize)
                .filter_map(|minute| NaiveTime::from_hms_opt(minute / 60, minute % 60, 0))
        })
        .collect()
}

/// `generate_slot_times` rendered as "HH:MM".
pub fn generate_slots(raw_interval_minutes: i64) -> Vec<String> {
    generate_slot_times(normalize_interval(raw_interval_minutes))
        .into_iter()
        .map(format_slot)
        .collect()
}

pub fn format_slot(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn is_slot(time: NaiveTime, interval: SlotInterval) -> bool {
    if time.second() != 0 || time.nanosecond() != 0 {
        return false;
    }
    let minute = time.hour() * 60 + time.minute();
    let step = interval.minutes() as u32;

    CLINIC_WINDOWS.iter().any(|window| {
        minute >= window.start_minute
            && minute <= window.end_minute
            && (minute - window.start_minute) % step == 0
    })
}

/// Accepts "HH:MM" and "HH:MM:SS".
pub fn parse_slot_time(raw: &str) -> Result<NaiveTime, SchedulingError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| SchedulingError::InvalidInput(format!("'{}' is not a valid HH:MM time", raw)))
}
