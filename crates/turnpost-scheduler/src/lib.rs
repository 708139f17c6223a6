//! Turnpost Scheduler: timeout policy recomputed from persisted timestamps.
//!
//! [`plan::evaluate`] is a pure function of a session and the current time.
//! [`sweep::TimeoutScheduler`] loads due sessions, applies their plans
//! through the version-checked store and sends reminders after the commit.
//! No timer survives between invocations.

pub mod plan;
pub mod sweep;

pub use plan::{TimeoutAction, TimeoutOutcome, TimeoutPlan, apply, evaluate};
pub use sweep::{SweepOutcome, TimeoutScheduler};
