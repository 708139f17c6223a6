//! Aggregate root abstraction.

use crate::event::DomainEvent;

/// Trait for aggregate roots persisted as versioned snapshots.
///
/// The version is the optimistic-concurrency token: it is captured on every
/// read and a write is only accepted while the stored version still matches.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces.
    type Event: DomainEvent;

    /// Returns the version the aggregate was loaded at (0 when never stored).
    fn version(&self) -> i64;

    /// Returns events produced by command handling since the last commit.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Records that the snapshot and its uncommitted events were stored at
    /// `version`, and clears the events.
    fn mark_committed(&mut self, version: i64);
}
