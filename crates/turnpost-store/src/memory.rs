//! In-memory implementation of the `SessionRepository` trait.
//!
//! Used when no database is configured and throughout the test suites. Its
//! conditional-write semantics match the PostgreSQL repository: a snapshot
//! and its journal entries land together or not at all.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use turnpost_core::error::DomainError;
use turnpost_core::identity::SessionId;
use turnpost_core::repository::{SessionRepository, StoredEvent, StoredSession};

#[derive(Debug)]
struct Entry {
    snapshot: StoredSession,
    journal: Vec<StoredEvent>,
}

/// Session repository backed by a process-local map.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionId, Entry>>,
}

impl InMemorySessionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, DomainError> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }

    /// Whether the repository holds no sessions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::Infrastructure("session map lock poisoned".to_owned())
}

/// Rejects events that belong elsewhere or would not extend the journal.
fn check_journal(
    session_id: &SessionId,
    last_sequence: i64,
    events: &[StoredEvent],
) -> Result<(), DomainError> {
    let mut last = last_sequence;
    for event in events {
        if &event.session_id != session_id {
            return Err(DomainError::Infrastructure(format!(
                "event {} belongs to session {}",
                event.event_id, event.session_id
            )));
        }
        if event.sequence_number <= last {
            return Err(DomainError::Infrastructure(format!(
                "journal sequence {} already taken for session {session_id}",
                event.sequence_number
            )));
        }
        last = event.sequence_number;
    }
    Ok(())
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<StoredSession>, DomainError> {
        Ok(self
            .sessions
            .read()
            .map_err(poisoned)?
            .get(session_id)
            .map(|entry| entry.snapshot.clone()))
    }

    async fn save_session(
        &self,
        session: StoredSession,
        events: &[StoredEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        if session.version != expected_version + 1 {
            return Err(DomainError::Infrastructure(format!(
                "version must advance by one: expected {}, got {}",
                expected_version + 1,
                session.version
            )));
        }

        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let existing = sessions.get_mut(&session.session_id);
        let actual = existing.as_ref().map_or(0, |e| e.snapshot.version);
        if actual != expected_version {
            if expected_version > 0 && actual == 0 {
                return Err(DomainError::SessionNotFound(session.session_id));
            }
            return Err(DomainError::ConcurrencyConflict {
                session_id: session.session_id,
                expected: expected_version,
                actual,
            });
        }

        match existing {
            Some(entry) => {
                let last = entry.journal.last().map_or(0, |e| e.sequence_number);
                check_journal(&session.session_id, last, events)?;
                entry.journal.extend_from_slice(events);
                entry.snapshot = session;
            }
            None => {
                check_journal(&session.session_id, 0, events)?;
                sessions.insert(
                    session.session_id.clone(),
                    Entry {
                        snapshot: session,
                        journal: events.to_vec(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn load_events(&self, session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .sessions
            .read()
            .map_err(poisoned)?
            .get(session_id)
            .map(|entry| entry.journal.clone())
            .unwrap_or_default())
    }

    async fn list_due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, DomainError> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut due: Vec<(DateTime<Utc>, &SessionId)> = sessions
            .values()
            .filter_map(|e| {
                e.snapshot
                    .next_deadline
                    .filter(|deadline| *deadline <= now)
                    .map(|deadline| (deadline, &e.snapshot.session_id))
            })
            .collect();
        due.sort();
        Ok(due.into_iter().take(limit).map(|(_, id)| id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn stored(id: &str, version: i64, next_deadline: Option<DateTime<Utc>>) -> StoredSession {
        StoredSession {
            session_id: SessionId::parse(id).unwrap(),
            version,
            status: "active".to_owned(),
            next_deadline,
            payload: json!({ "v": version }),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    fn event(id: &str, sequence_number: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            session_id: SessionId::parse(id).unwrap(),
            event_type: "session.turn_opened".to_owned(),
            payload: json!({ "seq": sequence_number }),
            sequence_number,
            correlation_id: Uuid::new_v4(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_then_update_with_matching_version() {
        let repo = InMemorySessionRepository::new();

        repo.save_session(stored("s1", 1, None), &[], 0).await.unwrap();
        repo.save_session(stored("s1", 2, None), &[], 1).await.unwrap();

        let loaded = repo
            .load_session(&SessionId::parse("s1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.payload, json!({ "v": 2 }));
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected_and_state_kept() {
        // Arrange
        let repo = InMemorySessionRepository::new();
        repo.save_session(stored("s1", 1, None), &[], 0).await.unwrap();
        repo.save_session(stored("s1", 2, None), &[], 1).await.unwrap();

        // Act
        let result = repo.save_session(stored("s1", 2, None), &[], 1).await;

        // Assert
        match result {
            Err(DomainError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(repo.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let repo = InMemorySessionRepository::new();
        repo.save_session(stored("s1", 1, None), &[], 0).await.unwrap();

        let result = repo.save_session(stored("s1", 1, None), &[], 0).await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict { actual: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_update_of_missing_session_is_not_found() {
        let repo = InMemorySessionRepository::new();

        let result = repo.save_session(stored("ghost", 3, None), &[], 2).await;

        assert!(matches!(result, Err(DomainError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_due_sessions_orders_by_deadline_and_limits() {
        // Arrange
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let repo = InMemorySessionRepository::new();
        repo.save_session(stored("late", 1, Some(now - Duration::hours(1))), &[], 0)
            .await
            .unwrap();
        repo.save_session(stored("early", 1, Some(now - Duration::hours(3))), &[], 0)
            .await
            .unwrap();
        repo.save_session(stored("future", 1, Some(now + Duration::hours(1))), &[], 0)
            .await
            .unwrap();
        repo.save_session(stored("idle", 1, None), &[], 0).await.unwrap();

        // Act
        let all = repo.list_due_sessions(now, 10).await.unwrap();
        let first = repo.list_due_sessions(now, 1).await.unwrap();

        // Assert
        let ids: Vec<&str> = all.iter().map(SessionId::as_str).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].as_str(), "early");
    }

    #[tokio::test]
    async fn test_journal_grows_with_each_accepted_write() {
        // Arrange
        let repo = InMemorySessionRepository::new();
        let id = SessionId::parse("s1").unwrap();

        // Act
        repo.save_session(stored("s1", 1, None), &[event("s1", 1), event("s1", 2)], 0)
            .await
            .unwrap();
        repo.save_session(stored("s1", 2, None), &[event("s1", 3)], 1)
            .await
            .unwrap();
        let stale = repo
            .save_session(stored("s1", 2, None), &[event("s1", 4)], 1)
            .await;

        // Assert
        assert!(matches!(stale, Err(DomainError::ConcurrencyConflict { .. })));
        let journal = repo.load_events(&id).await.unwrap();
        let sequence: Vec<i64> = journal.iter().map(|e| e.sequence_number).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reused_sequence_number_rejects_the_whole_write() {
        let repo = InMemorySessionRepository::new();
        repo.save_session(stored("s1", 1, None), &[event("s1", 1)], 0)
            .await
            .unwrap();

        let result = repo
            .save_session(stored("s1", 2, None), &[event("s1", 1)], 1)
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        let loaded = repo
            .load_session(&SessionId::parse("s1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_journal_of_unknown_session_is_empty() {
        let repo = InMemorySessionRepository::new();

        let journal = repo
            .load_events(&SessionId::parse("nobody").unwrap())
            .await
            .unwrap();

        assert!(journal.is_empty());
    }
}
