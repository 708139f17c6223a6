//! Command handlers for the session context.
//!
//! Each handler loads the aggregate, executes the command, and commits the
//! resulting snapshot through the versioned store.

use tracing::info;
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::identity::SessionId;
use turnpost_core::repository::SessionRepository;
use turnpost_core::rng::DeterministicRng;

use crate::application::store::SessionStore;
use crate::domain::aggregates::{Progress, Session};
use crate::domain::commands::{CompleteSession, StartSession};
use crate::domain::timeouts::GameProfile;
use crate::domain::turn::Contribution;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct SessionCommandResult {
    /// The committed session.
    pub session: Session,
    /// Where the session stands after the commit.
    pub progress: Progress,
}

impl SessionCommandResult {
    /// The session identifier.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session.id
    }
}

/// Handles the `StartSession` command: creates a session with a fresh id,
/// registers the initiator, evaluates quorum, and commits the first
/// snapshot. A single-player profile activates at once and claims turn 1.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the game type does not match the
/// profile, and `DomainError` from the commit.
pub async fn handle_start_session(
    command: &StartSession,
    profile: &GameProfile,
    clock: &dyn Clock,
    rng: &mut dyn DeterministicRng,
    repo: &dyn SessionRepository,
) -> Result<SessionCommandResult, DomainError> {
    if command.game_type != profile.game_type {
        return Err(DomainError::Validation(format!(
            "profile {} cannot start a {} session",
            profile.game_type, command.game_type
        )));
    }

    let opening = Contribution {
        content: command.content.clone(),
        submitted_at: clock.now(),
        attachments: command.attachments.clone(),
    };
    let mut session = Session::start(
        SessionId::generate(rng),
        profile,
        command.initiator.clone(),
        opening,
        command.correlation_id,
        clock,
    );
    let progress = session.settle_membership(command.correlation_id, clock)?;

    SessionStore::new(repo).put_session(&mut session).await?;
    info!(
        session_id = %session.id,
        game_type = %session.game_type,
        status = session.status.as_str(),
        "session started"
    );

    Ok(SessionCommandResult { session, progress })
}

/// Handles the `CompleteSession` command: the explicit completion signal for
/// an active session.
///
/// # Errors
///
/// Returns `DomainError::SessionNotFound`, `DomainError::InvalidTransition`
/// unless the session is active, or `DomainError` from the commit.
pub async fn handle_complete_session(
    command: &CompleteSession,
    clock: &dyn Clock,
    repo: &dyn SessionRepository,
) -> Result<SessionCommandResult, DomainError> {
    let store = SessionStore::new(repo);
    let mut session = store.get_session(&command.session_id).await?;

    session.complete(command.correlation_id, clock)?;
    store.put_session(&mut session).await?;
    info!(session_id = %session.id, "session completed");

    let progress = session.progress();
    Ok(SessionCommandResult { session, progress })
}
