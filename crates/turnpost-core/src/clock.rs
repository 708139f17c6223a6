//! Clock abstraction.
//!
//! Every elapsed-time decision (turn deadlines, reminder windows, join
//! windows, processing leases) is recomputed from persisted timestamps and the
//! clock passed into the call. Nothing keeps a timer alive between
//! invocations.

use chrono::{DateTime, Utc};

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
