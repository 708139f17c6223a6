//! Session repository abstraction.
//!
//! Sessions are persisted as versioned snapshots. Every write is conditional
//! on the version captured when the snapshot was read, and appends the
//! events that produced it to the session's journal in the same write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::identity::SessionId;

/// A committed event, as kept in the session's journal.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Session the event belongs to.
    pub session_id: SessionId,
    /// Dotted type name, e.g. `session.turn_opened`.
    pub event_type: String,
    /// Serialized event body.
    pub payload: serde_json::Value,
    /// Position in the session's journal, starting at 1.
    pub sequence_number: i64,
    /// Correlation ID of the command or sweep that produced the event.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Stored representation of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    /// Session identifier.
    pub session_id: SessionId,
    /// Version after this write (1 for a freshly created session).
    pub version: i64,
    /// Lifecycle status, as its snake_case name.
    pub status: String,
    /// Earliest instant at which the timeout sweep has work for this session.
    pub next_deadline: Option<DateTime<Utc>>,
    /// Serialized session snapshot.
    pub payload: serde_json::Value,
    /// Timestamp of the write.
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for loading and conditionally saving sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Load the latest snapshot of a session, if it exists.
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<StoredSession>, DomainError>;

    /// Save a snapshot with optimistic concurrency, appending `events` to
    /// the session's journal in the same write.
    ///
    /// `expected_version` is the version the caller read; `0` means the
    /// session must not exist yet. On mismatch the write is rejected with
    /// `DomainError::ConcurrencyConflict` and neither the snapshot nor the
    /// journal is changed.
    async fn save_session(
        &self,
        session: StoredSession,
        events: &[StoredEvent],
        expected_version: i64,
    ) -> Result<(), DomainError>;

    /// Load a session's journal in sequence order. Empty for an unknown
    /// session.
    async fn load_events(&self, session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError>;

    /// List sessions whose `next_deadline` is at or before `now`, earliest
    /// first, up to `limit` entries.
    async fn list_due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, DomainError>;
}
