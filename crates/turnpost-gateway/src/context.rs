//! Per-invocation security context.

use std::collections::BTreeSet;
use std::fmt;

use turnpost_core::identity::{GameType, PlayerEmail, SessionId};
use turnpost_session::domain::aggregates::Session;
use turnpost_session::domain::lifecycle::SessionStatus;

use crate::registry::ToolRegistry;

/// Who caused the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// An authenticated inbound message from a player.
    Player(PlayerEmail),
    /// The timeout sweep.
    Scheduler,
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(email) => write!(f, "player:{email}"),
            Self::Scheduler => f.write_str("scheduler"),
        }
    }
}

/// The authority one inbound-processing invocation holds over one session.
///
/// Built from the server-resolved session and the authenticated sender,
/// never from anything the model says. Not `Clone` and not serializable; the
/// session id is only readable inside this crate.
pub struct SecurityContext {
    session_id: SessionId,
    caller: Caller,
    game_type: GameType,
    status: SessionStatus,
    permitted: BTreeSet<String>,
}

impl SecurityContext {
    /// Binds a context to a session as it was just read. The allow-list is
    /// computed from the session status at this moment.
    #[must_use]
    pub fn bind(session: &Session, caller: Caller, registry: &ToolRegistry) -> Self {
        Self {
            session_id: session.id.clone(),
            caller,
            game_type: session.game_type.clone(),
            status: session.status,
            permitted: registry.permitted_for(session.status),
        }
    }

    pub(crate) fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The caller the context was bound for.
    #[must_use]
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Game type of the bound session. Tool-call logs are labelled with it.
    #[must_use]
    pub fn game_type(&self) -> &GameType {
        &self.game_type
    }

    /// Session status at bind time.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the allow-list contains the tool.
    #[must_use]
    pub fn permits(&self, tool: &str) -> bool {
        self.permitted.contains(tool)
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("session_id", &"[redacted]")
            .field("caller", &self.caller)
            .field("game_type", &self.game_type)
            .field("status", &self.status)
            .field("permitted", &self.permitted)
            .finish()
    }
}
