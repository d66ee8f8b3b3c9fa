//! Bounded log of notable happenings.

use crate::resident::ResidentId;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Arrival,
    Departure,
    Crowding,
    Elevator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: SimTime,
    pub clock: String,
    pub kind: EventKind,
    pub resident: Option<ResidentId>,
    pub resident_name: Option<String>,
    pub description: String,
    pub location: String,
}

/// Append-only event log that drops its oldest entries beyond `retention`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    events: VecDeque<Event>,
    retention: usize,
    total: u64,
}

impl EventLog {
    pub fn new(retention: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(retention.min(1024)),
            retention: retention.max(1),
            total: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        log::debug!(
            "{} {:?} {}: {}",
            event.time,
            event.kind,
            event.resident_name.as_deref().unwrap_or("-"),
            event.description
        );
        self.events.push_back(event);
        self.total += 1;
        while self.events.len() > self.retention {
            self.events.pop_front();
        }
    }

    /// Retained events, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Event> {
        self.events.iter()
    }

    /// The `n` most recent events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Event> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events ever pushed, including dropped ones.
    pub fn total(&self) -> u64 {
        self.total
    }
}
