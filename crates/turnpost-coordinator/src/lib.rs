//! Turnpost: turn coordination.
//!
//! Drives one inbound submission or one timeout sweep from a fresh read to
//! its final commit: recording, claiming, narration through a bound tool
//! gateway, and fan-out of the result.

pub mod coordinator;
pub mod dispatcher;

pub use coordinator::{
    SubmissionOutcome, SweepReport, SweptSession, TurnCoordinator, TurnResolution,
};
pub use dispatcher::{Dispatcher, RetryPolicy};
