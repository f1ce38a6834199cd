//! Time source for timestamps and seasonal lookups.

use chrono::{DateTime, Datelike, Utc};

/// Supplies "now" to the core so tests can pin the calendar.
pub trait Clock {
    /// Current UTC timestamp
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar month, 1..=12
    fn month(&self) -> u32 {
        self.now().month()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
