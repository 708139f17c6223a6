//! Test repositories: `SessionRepository` doubles for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use turnpost_core::error::DomainError;
use turnpost_core::identity::SessionId;
use turnpost_core::repository::{SessionRepository, StoredEvent, StoredSession};
use turnpost_store::InMemorySessionRepository;

/// An in-memory repository that records every `save_session` call and counts
/// every storage access.
#[derive(Debug, Default)]
pub struct RecordingSessionRepository {
    inner: InMemorySessionRepository,
    saved: Mutex<Vec<(StoredSession, i64)>>,
    loads: AtomicUsize,
}

impl RecordingSessionRepository {
    /// Create an empty recording repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all saved sessions with their expected versions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_sessions(&self) -> Vec<(StoredSession, i64)> {
        self.saved.lock().unwrap().clone()
    }

    /// Number of successful saves.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn save_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    /// Number of `load_session` and `list_due_sessions` calls.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Whether the repository was touched at all.
    pub fn untouched(&self) -> bool {
        self.load_count() == 0 && self.save_count() == 0
    }
}

#[async_trait]
impl SessionRepository for RecordingSessionRepository {
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<StoredSession>, DomainError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_session(session_id).await
    }

    async fn save_session(
        &self,
        session: StoredSession,
        events: &[StoredEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        self.inner
            .save_session(session.clone(), events, expected_version)
            .await?;
        self.saved.lock().unwrap().push((session, expected_version));
        Ok(())
    }

    async fn load_events(&self, session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_events(session_id).await
    }

    async fn list_due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, DomainError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_due_sessions(now, limit).await
    }
}

/// A session repository that always returns an infrastructure error. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingSessionRepository;

#[async_trait]
impl SessionRepository for FailingSessionRepository {
    async fn load_session(
        &self,
        _session_id: &SessionId,
    ) -> Result<Option<StoredSession>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save_session(
        &self,
        _session: StoredSession,
        _events: &[StoredEvent],
        _expected_version: i64,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_events(&self, _session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_due_sessions(
        &self,
        _now: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<SessionId>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// An in-memory repository whose first `n` updates lose a simulated race
/// with a concurrent writer. Creates are never failed.
#[derive(Debug, Default)]
pub struct ConflictingSessionRepository {
    inner: InMemorySessionRepository,
    remaining: AtomicU32,
    attempts: AtomicU32,
}

impl ConflictingSessionRepository {
    /// Fails the next `conflicts` updates with `ConcurrencyConflict`.
    #[must_use]
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemorySessionRepository::new(),
            remaining: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
        }
    }

    /// Number of update attempts, failed ones included.
    pub fn update_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRepository for ConflictingSessionRepository {
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<StoredSession>, DomainError> {
        self.inner.load_session(session_id).await
    }

    async fn save_session(
        &self,
        session: StoredSession,
        events: &[StoredEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        if expected_version > 0 {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let lost = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if lost {
                return Err(DomainError::ConcurrencyConflict {
                    session_id: session.session_id,
                    expected: expected_version,
                    actual: expected_version + 1,
                });
            }
        }
        self.inner
            .save_session(session, events, expected_version)
            .await
    }

    async fn load_events(&self, session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(session_id).await
    }

    async fn list_due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, DomainError> {
        self.inner.list_due_sessions(now, limit).await
    }
}

/// An in-memory repository that yields to the scheduler around every access,
/// so that futures polled together with `tokio::join!` interleave between
/// their read and their write.
#[derive(Debug, Default)]
pub struct YieldingSessionRepository {
    inner: InMemorySessionRepository,
}

impl YieldingSessionRepository {
    /// Create an empty yielding repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for YieldingSessionRepository {
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<StoredSession>, DomainError> {
        let loaded = self.inner.load_session(session_id).await;
        tokio::task::yield_now().await;
        loaded
    }

    async fn save_session(
        &self,
        session: StoredSession,
        events: &[StoredEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        tokio::task::yield_now().await;
        self.inner
            .save_session(session, events, expected_version)
            .await
    }

    async fn load_events(&self, session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(session_id).await
    }

    async fn list_due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, DomainError> {
        self.inner.list_due_sessions(now, limit).await
    }
}
