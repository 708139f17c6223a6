//! Domain error types.

use thiserror::Error;

use crate::identity::{PlayerEmail, SessionId};

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No session exists for the identifier.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on session {session_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The session that had the conflict.
        session_id: SessionId,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// The event is not allowed from the current state.
    #[error("invalid transition: {event} is not allowed from {from}")]
    InvalidTransition {
        /// The state the machine was in.
        from: &'static str,
        /// The rejected event.
        event: &'static str,
    },

    /// A submission targeted a turn that has already closed.
    #[error("stale turn: submitted for turn {submitted}, current turn is {current}")]
    StaleTurn {
        /// The turn number carried by the submission.
        submitted: u32,
        /// The session's current turn number.
        current: u32,
    },

    /// The turn no longer accepts new contributions.
    #[error("turn {0} is closed to new contributions")]
    TurnClosed(u32),

    /// The sender is not a player of the session.
    #[error("player not recognized: {0}")]
    PlayerNotRecognized(PlayerEmail),

    /// The session already holds its maximum number of players.
    #[error("session is full ({max_players} players)")]
    SessionFull {
        /// Configured maximum.
        max_players: u32,
    },

    /// The tool is not in the allow-list for the bound session state.
    #[error("tool {tool} is not permitted while session is {status}")]
    UnauthorizedToolCall {
        /// The requested tool.
        tool: String,
        /// The status the allow-list was computed from.
        status: &'static str,
    },

    /// No tool is registered under the name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A parameter outside the tool's closed schema was supplied.
    #[error("tool {tool} does not accept parameter {parameter}")]
    ForbiddenParameter {
        /// The requested tool.
        tool: String,
        /// The rejected parameter name.
        parameter: String,
    },

    /// Timeout configuration is inconsistent.
    #[error("timeout policy violation: {0}")]
    TimeoutPolicyViolation(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Whether the whole operation can be retried from a fresh read.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Short machine-readable code for the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::ConcurrencyConflict { .. } => "retryable",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::StaleTurn { .. } => "stale_turn",
            Self::TurnClosed(_) => "turn_closed",
            Self::PlayerNotRecognized(_) => "player_not_recognized",
            Self::SessionFull { .. } => "session_full",
            Self::UnauthorizedToolCall { .. } => "unauthorized_tool_call",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ForbiddenParameter { .. } => "forbidden_parameter",
            Self::TimeoutPolicyViolation(_) => "timeout_policy_violation",
            Self::Validation(_) => "validation_error",
            Self::Infrastructure(_) => "internal_error",
        }
    }

    /// Message safe to show to the model or the remote party.
    ///
    /// Never contains session ids, versions, or storage detail.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::SessionNotFound(_) => "the session could not be found".to_owned(),
            Self::ConcurrencyConflict { .. } => {
                "the session changed concurrently, please retry".to_owned()
            }
            Self::InvalidTransition { from, .. } => {
                format!("the session does not accept this while {from}")
            }
            Self::StaleTurn { current, .. } => {
                format!("that turn has already closed; the current turn is {current}")
            }
            Self::TurnClosed(turn) => format!("turn {turn} is already being resolved"),
            Self::PlayerNotRecognized(_) => "you are not a player in this session".to_owned(),
            Self::SessionFull { max_players } => {
                format!("the session is full ({max_players} players)")
            }
            Self::UnauthorizedToolCall { tool, .. } => {
                format!("tool {tool} is not available right now")
            }
            Self::UnknownTool(tool) => format!("unknown tool {tool}"),
            Self::ForbiddenParameter { parameter, .. } => {
                format!("parameter {parameter} is not accepted")
            }
            Self::TimeoutPolicyViolation(_) => "invalid timeout configuration".to_owned(),
            Self::Validation(message) => message.clone(),
            Self::Infrastructure(_) => "internal error".to_owned(),
        }
    }
}
