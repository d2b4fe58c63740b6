//! Calendar and time window models.
//!
//! Every instant is workable unless the caller blocks it out. Weekends,
//! holidays and maintenance shutdowns arrive as unavailable windows and are
//! treated the same way as bad weather: a task window may not touch them.
//!
//! # Time Model
//! Instants are UTC. Intervals are half-open `[start, end)`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A time interval [start, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Interval start (inclusive).
    pub start: DateTime<Utc>,
    /// Interval end (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window of the given length starting at `start`.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the window has no extent.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether an instant falls within this window.
    #[inline]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The same window moved by `offset`.
    pub fn shifted(&self, offset: Duration) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }
}

/// Caller-injected unavailability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    /// Periods when no work may happen.
    pub unavailable: Vec<TimeWindow>,
}

impl Calendar {
    /// Creates a calendar with no blocked periods.
    pub fn always_available() -> Self {
        Self::default()
    }

    /// Adds a blocked period.
    pub fn with_unavailable(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.unavailable.push(TimeWindow::new(start, end));
        self
    }

    /// Blocked periods intersecting `window`, in start order.
    pub fn conflicts(&self, window: &TimeWindow) -> Vec<TimeWindow> {
        let mut hits: Vec<TimeWindow> = self
            .unavailable
            .iter()
            .filter(|w| w.overlaps(window))
            .copied()
            .collect();
        hits.sort();
        hits
    }
}
