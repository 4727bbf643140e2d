use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use shared_models::QueueItem;

/// The instant an item is queued by: its appointment if it has one, else its arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAnchor {
    Appointment(DateTime<Utc>),
    Arrival(DateTime<Utc>),
}

impl TimeAnchor {
    pub fn of(item: &QueueItem) -> Self {
        match item.appointment_at {
            Some(at) => TimeAnchor::Appointment(at),
            None => TimeAnchor::Arrival(item.added_at),
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            TimeAnchor::Appointment(at) | TimeAnchor::Arrival(at) => *at,
        }
    }
}

/// Total order used everywhere queue items are ranked: urgent first, then by
/// anchor instant, then arrival, then ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOrderKey<'a> {
    pub priority_rank: u8,
    pub anchor: TimeAnchor,
    pub added_at: DateTime<Utc>,
    pub ticket: &'a str,
}

impl<'a> QueueOrderKey<'a> {
    pub fn of(item: &'a QueueItem) -> Self {
        Self {
            priority_rank: item.priority.rank(),
            anchor: TimeAnchor::of(item),
            added_at: item.added_at,
            ticket: &item.ticket,
        }
    }
}

impl Ord for QueueOrderKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority_rank
            .cmp(&other.priority_rank)
            .then_with(|| self.anchor.at().cmp(&other.anchor.at()))
            .then_with(|| self.added_at.cmp(&other.added_at))
            .then_with(|| self.ticket.cmp(other.ticket))
    }
}

impl PartialOrd for QueueOrderKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn compare_queue_items(a: &QueueItem, b: &QueueItem) -> Ordering {
    QueueOrderKey::of(a).cmp(&QueueOrderKey::of(b))
}

pub fn sort_queue(items: &mut [QueueItem]) {
    items.sort_by(compare_queue_items);
}
