//! Timeout sweep over stored sessions.

use tracing::{info, instrument, warn};
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::identity::SessionId;
use turnpost_core::notifier::Notifier;
use turnpost_core::repository::SessionRepository;
use turnpost_session::application::store::SessionStore;
use uuid::Uuid;

use crate::plan::{TimeoutOutcome, apply, evaluate};

/// Result of sweeping one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub session_id: SessionId,
    pub outcome: TimeoutOutcome,
    /// Whether a new version was committed.
    pub committed: bool,
}

/// Applies due timeout actions through the versioned store.
#[derive(Clone, Copy)]
pub struct TimeoutScheduler<'a> {
    repo: &'a dyn SessionRepository,
    notifier: &'a dyn Notifier,
    clock: &'a dyn Clock,
}

impl std::fmt::Debug for TimeoutScheduler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutScheduler").finish_non_exhaustive()
    }
}

impl<'a> TimeoutScheduler<'a> {
    #[must_use]
    pub fn new(
        repo: &'a dyn SessionRepository,
        notifier: &'a dyn Notifier,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            repo,
            notifier,
            clock,
        }
    }

    /// Sessions with timeout work due now, earliest deadline first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the due index cannot be read.
    pub async fn due_sessions(&self, limit: usize) -> Result<Vec<SessionId>, DomainError> {
        SessionStore::new(self.repo)
            .list_due_timeouts(self.clock.now(), limit)
            .await
    }

    /// Evaluates one session at the current time and commits whatever is
    /// due. Reminders are sent only after the commit succeeds; a failed send
    /// is logged and not retried.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if another writer committed
    /// first (nothing is sent), and any error from loading the session.
    #[instrument(skip(self, session_id), fields(session_id = %session_id))]
    pub async fn sweep_session(
        &self,
        session_id: &SessionId,
        correlation_id: Uuid,
    ) -> Result<SweepOutcome, DomainError> {
        let store = SessionStore::new(self.repo);
        let mut session = store.get_session(session_id).await?;
        let plan = evaluate(&session, self.clock.now());
        let outcome = apply(&mut session, &plan, correlation_id, self.clock)?;
        if !outcome.changed {
            return Ok(SweepOutcome {
                session_id: session_id.clone(),
                outcome,
                committed: false,
            });
        }

        store.put_session(&mut session).await?;
        info!(
            turn_number = plan.turn_number,
            reminders = outcome.reminders.len(),
            missed = outcome.newly_missed.len(),
            claimed = ?outcome.claimed,
            abandoned = ?outcome.abandoned.map(|cause| cause.as_str()),
            "timeouts applied"
        );

        for reminder in &outcome.reminders {
            if let Err(err) = self.notifier.send_reminder(reminder).await {
                warn!(turn_number = reminder.turn_number, error = %err, "reminder not sent");
            }
        }
        Ok(SweepOutcome {
            session_id: session_id.clone(),
            outcome,
            committed: true,
        })
    }
}
