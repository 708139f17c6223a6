//! Versioned session store.
//!
//! The storage adapter every component commits through. Reads capture the
//! stored version; writes are accepted only while it still matches, and
//! carry the events that produced the snapshot into the session's journal.

use chrono::{DateTime, Utc};
use tracing::debug;
use turnpost_core::aggregate::AggregateRoot;
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::event::DomainEvent;
use turnpost_core::identity::{PlayerEmail, SessionId};
use turnpost_core::repository::{SessionRepository, StoredEvent};
use uuid::Uuid;

use crate::domain::aggregates::{Progress, Session};
use crate::domain::events::SessionEvent;
use crate::domain::turn::{Contribution, RecordOutcome};

fn to_stored_event(event: &SessionEvent) -> StoredEvent {
    let meta = event.metadata();
    StoredEvent {
        event_id: meta.event_id,
        session_id: meta.session_id.clone(),
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        sequence_number: meta.sequence_number,
        correlation_id: meta.correlation_id,
        occurred_at: meta.occurred_at,
    }
}

/// Thin adapter over a [`SessionRepository`] that speaks in sessions.
#[derive(Clone, Copy)]
pub struct SessionStore<'a> {
    repo: &'a dyn SessionRepository,
}

impl std::fmt::Debug for SessionStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl<'a> SessionStore<'a> {
    /// Wraps a repository.
    #[must_use]
    pub fn new(repo: &'a dyn SessionRepository) -> Self {
        Self { repo }
    }

    /// Loads a session at its current version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionNotFound` if no session exists and
    /// `DomainError::Infrastructure` if loading or decoding fails.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session, DomainError> {
        let stored = self
            .repo
            .load_session(session_id)
            .await?
            .ok_or_else(|| DomainError::SessionNotFound(session_id.clone()))?;
        Session::from_stored(&stored)
    }

    /// Commits a session against the version it was loaded at (0 for a new
    /// session), appending its uncommitted events to the journal in the same
    /// write. On success the session's version advances and its events are
    /// drained.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if another writer got there
    /// first; the in-memory session is left untouched and nothing reaches the
    /// journal.
    pub async fn put_session(&self, session: &mut Session) -> Result<(), DomainError> {
        let expected_version = session.version();
        let stored = session.to_stored();
        let version = stored.version;
        let events: Vec<StoredEvent> = session
            .uncommitted_events()
            .iter()
            .map(to_stored_event)
            .collect();
        self.repo
            .save_session(stored, &events, expected_version)
            .await?;

        debug!(
            session_id = %session.id,
            version,
            events = events.len(),
            last_event = events.last().map(|e| e.event_type.as_str()),
            "session committed"
        );
        session.mark_committed(version);
        Ok(())
    }

    /// The session's journal in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the journal cannot be read.
    pub async fn get_events(&self, session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError> {
        self.repo.load_events(session_id).await
    }

    /// Records a contribution to an already-loaded session under its
    /// idempotency key and commits it against the loaded version. A
    /// duplicate is not written, so the version does not move.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from the aggregate and
    /// `DomainError::ConcurrencyConflict` from the commit.
    pub async fn append_contribution(
        &self,
        session: &mut Session,
        player: &PlayerEmail,
        turn_number: Option<u32>,
        contribution: Contribution,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(RecordOutcome, Progress), DomainError> {
        let (outcome, progress) =
            session.record_submission(player, turn_number, contribution, correlation_id, clock)?;
        if outcome != RecordOutcome::Duplicate {
            self.put_session(session).await?;
        }
        Ok((outcome, progress))
    }

    /// Sessions with timeout work due at `now`, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the index query fails.
    pub async fn list_due_timeouts(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, DomainError> {
        self.repo.list_due_sessions(now, limit).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use turnpost_core::repository::SessionRepository;
    use turnpost_test_support::{
        FailingSessionRepository, FixedClock, RecordingSessionRepository,
    };

    use super::*;
    use crate::domain::player::PlayerRole;
    use crate::domain::timeouts::{GameProfile, TimeoutConfig};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn new_session(clock: &dyn Clock) -> Session {
        Session::start(
            SessionId::parse("abc234").unwrap(),
            &GameProfile::dungeon(TimeoutConfig::default()),
            PlayerEmail::parse("a@example.com").unwrap(),
            Contribution {
                content: "I wake up in a cave".to_owned(),
                submitted_at: clock.now(),
                attachments: Vec::new(),
            },
            Uuid::new_v4(),
            clock,
        )
    }

    #[tokio::test]
    async fn test_put_session_creates_with_expected_version_zero() {
        // Arrange
        let clock = FixedClock(fixed_now());
        let repo = RecordingSessionRepository::new();
        let store = SessionStore::new(&repo);
        let mut session = new_session(&clock);

        // Act
        store.put_session(&mut session).await.unwrap();

        // Assert
        let saved = repo.saved_sessions();
        assert_eq!(saved.len(), 1);
        let (stored, expected_version) = &saved[0];
        assert_eq!(*expected_version, 0);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, "initializing");
        assert_eq!(session.version(), 1);
        assert!(session.uncommitted_events().is_empty());
    }

    #[tokio::test]
    async fn test_stale_copy_loses_to_first_writer() {
        // Arrange
        let clock = FixedClock(fixed_now());
        let repo = RecordingSessionRepository::new();
        let store = SessionStore::new(&repo);
        let mut session = new_session(&clock);
        store.put_session(&mut session).await.unwrap();
        let mut first = store.get_session(&session.id).await.unwrap();
        let mut second = store.get_session(&session.id).await.unwrap();

        // Act
        first.settle_membership(Uuid::new_v4(), &clock).unwrap();
        store.put_session(&mut first).await.unwrap();
        second.settle_membership(Uuid::new_v4(), &clock).unwrap();
        let result = store.put_session(&mut second).await;

        // Assert
        match result.unwrap_err() {
            DomainError::ConcurrencyConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(second.version(), 1);
        let journal = store.get_events(&session.id).await.unwrap();
        assert_eq!(journal.len(), usize::try_from(first.events_recorded).unwrap());
    }

    #[tokio::test]
    async fn test_put_session_appends_events_to_journal() {
        // Arrange
        let clock = FixedClock(fixed_now());
        let repo = RecordingSessionRepository::new();
        let store = SessionStore::new(&repo);
        let mut session = new_session(&clock);
        let correlation_id = Uuid::new_v4();

        // Act
        store.put_session(&mut session).await.unwrap();
        session.settle_membership(correlation_id, &clock).unwrap();
        store.put_session(&mut session).await.unwrap();

        // Assert
        let journal = store.get_events(&session.id).await.unwrap();
        let sequence: Vec<i64> = journal.iter().map(|e| e.sequence_number).collect();
        let expected: Vec<i64> = (1..=session.events_recorded).collect();
        assert_eq!(sequence, expected);
        assert_eq!(journal[0].event_type, "session.started");
        assert!(journal[0].payload.get("SessionStarted").is_some());
        assert!(journal[3..].iter().all(|e| e.correlation_id == correlation_id));
        assert!(journal.iter().all(|e| e.session_id == session.id));
    }

    #[tokio::test]
    async fn test_get_session_returns_not_found_for_unknown_id() {
        let repo = RecordingSessionRepository::new();
        let store = SessionStore::new(&repo);
        let missing = SessionId::parse("nope").unwrap();

        let result = store.get_session(&missing).await;

        match result.unwrap_err() {
            DomainError::SessionNotFound(id) => assert_eq!(id, missing),
            other => panic!("expected SessionNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_contribution_is_not_written() {
        // Arrange
        let clock = FixedClock(fixed_now());
        let repo = RecordingSessionRepository::new();
        let store = SessionStore::new(&repo);
        let mut session = new_session(&clock);
        session.min_players = 2;
        let b = PlayerEmail::parse("b@example.com").unwrap();
        session
            .register_player(b.clone(), PlayerRole::Joined, Uuid::new_v4(), &clock)
            .unwrap();
        session.settle_membership(Uuid::new_v4(), &clock).unwrap();
        store.put_session(&mut session).await.unwrap();
        let contribution = Contribution {
            content: "I light a torch".to_owned(),
            submitted_at: fixed_now(),
            attachments: Vec::new(),
        };
        store
            .append_contribution(&mut session, &b, Some(1), contribution.clone(), Uuid::new_v4(), &clock)
            .await
            .unwrap();
        let version_after_first = session.version();

        // Act
        let (outcome, _) = store
            .append_contribution(&mut session, &b, Some(1), contribution, Uuid::new_v4(), &clock)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome, RecordOutcome::Duplicate);
        assert_eq!(session.version(), version_after_first);
        assert_eq!(repo.save_count(), 2);
    }

    #[tokio::test]
    async fn test_infrastructure_errors_propagate() {
        let repo = FailingSessionRepository;
        let store = SessionStore::new(&repo);

        let result = store.list_due_timeouts(fixed_now(), 10).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(repo.load_session(&SessionId::parse("x").unwrap()).await.is_err());
    }
}
