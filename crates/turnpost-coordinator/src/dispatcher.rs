//! Inbound delivery with bounded retries.

use std::time::Duration;

use tracing::{info, warn};
use turnpost_core::error::DomainError;
use turnpost_session::domain::commands::SubmitContribution;

use crate::coordinator::{SubmissionOutcome, TurnCoordinator};

/// Exponential backoff for retryable submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Cap on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (0-indexed), doubling each time.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Delivers submissions to the coordinator, retrying lost races from a fresh
/// read and telling the sender about anything that cannot succeed.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    coordinator: TurnCoordinator<'a>,
    policy: RetryPolicy,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(coordinator: TurnCoordinator<'a>, policy: RetryPolicy) -> Self {
        Self {
            coordinator,
            policy,
        }
    }

    /// Submits with retries. Terminal errors, and conflicts that outlast the
    /// policy, produce a failure notice to the sender carrying only the
    /// public message.
    ///
    /// # Errors
    ///
    /// Returns the last error once it is terminal or attempts run out.
    pub async fn dispatch(
        &self,
        command: &SubmitContribution,
    ) -> Result<SubmissionOutcome, DomainError> {
        let mut attempt = 0;
        loop {
            let err = match self.coordinator.submit(command).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => err,
            };
            attempt += 1;
            if err.is_retryable() && attempt < self.policy.max_attempts {
                let delay = self.policy.delay_for_attempt(attempt - 1);
                info!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying submission after conflict"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            warn!(code = err.code(), attempts = attempt, error = %err, "submission failed");
            let notice = self
                .coordinator
                .notifier
                .send_failure_notice(&command.player_email, &err.public_message())
                .await;
            if let Err(notice_err) = notice {
                warn!(error = %notice_err, "failure notice not sent");
            }
            return Err(err);
        }
    }
}
