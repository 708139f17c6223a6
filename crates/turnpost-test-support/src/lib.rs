//! Shared test doubles for the Turnpost workspace.

mod clock;
mod notifier;
mod repository;
mod rng;

pub use clock::{FixedClock, ManualClock};
pub use notifier::RecordingNotifier;
pub use repository::{
    ConflictingSessionRepository, FailingSessionRepository, RecordingSessionRepository,
    YieldingSessionRepository,
};
pub use rng::{MockRng, SequenceRng};
