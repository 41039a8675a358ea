//! Millisecond clock abstraction
//!
//! The host owns time: expiration checks and generator seeding go through
//! the [`Clock`] trait so tests can drive TTLs without sleeping. The core is
//! single-threaded cooperative, so clock handles are shared with `Rc`.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use bilist_core::TimestampMs;

/// Source of absolute wall-clock milliseconds
pub trait Clock {
    /// Returns the current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> TimestampMs;
}

/// The real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as TimestampMs)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to
///
/// Handles are cheap clones sharing one instant, so a test can hold a copy
/// and advance time while a container holds another.
///
/// # Example
///
/// ```
/// use bilist_storage::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let handle = clock.clone();
/// handle.advance(500);
/// assert_eq!(clock.now_ms(), 1_500);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<TimestampMs>>,
}

impl ManualClock {
    /// Creates a clock frozen at the given millisecond instant
    pub fn new(now: TimestampMs) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    /// Moves the clock forward by `delta_ms` milliseconds
    pub fn advance(&self, delta_ms: TimestampMs) {
        self.now.set(self.now.get() + delta_ms);
    }

    /// Sets the clock to an absolute instant
    pub fn set(&self, now: TimestampMs) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.get()
    }
}
