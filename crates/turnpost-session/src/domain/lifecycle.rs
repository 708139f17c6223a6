//! Session lifecycle state machine.

use serde::{Deserialize, Serialize};
use turnpost_core::error::DomainError;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created by the initiator, no onboarding reply sent yet.
    Initializing,
    /// Gathering players until `min_players` is reached.
    WaitingForPlayers,
    /// Turns are being played.
    Active,
    /// Ended normally.
    Completed,
    /// Ended by a quit, too many missed turns, or an expired join window.
    Abandoned,
}

impl SessionStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Initializing,
        Self::WaitingForPlayers,
        Self::Active,
        Self::Completed,
        Self::Abandoned,
    ];

    /// The snake_case name used in storage and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::WaitingForPlayers => "waiting_for_players",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Whether players may still be added.
    #[must_use]
    pub fn accepts_new_players(self) -> bool {
        matches!(self, Self::Initializing | Self::WaitingForPlayers)
    }
}

/// Inputs to the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The initiator has been answered and others may join.
    AwaitPlayers,
    /// Player count reached `min_players`.
    QuorumReached,
    /// Explicit completion signal or narrative end condition.
    Complete,
    /// A player quit.
    Quit,
    /// A player's consecutive misses exceeded the configured threshold.
    MissThresholdExceeded,
    /// Quorum was not reached within the join window.
    JoinWindowExpired,
}

impl LifecycleEvent {
    /// The snake_case name used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitPlayers => "await_players",
            Self::QuorumReached => "quorum_reached",
            Self::Complete => "complete",
            Self::Quit => "quit",
            Self::MissThresholdExceeded => "miss_threshold_exceeded",
            Self::JoinWindowExpired => "join_window_expired",
        }
    }
}

/// Computes the next lifecycle status. Pure; persisting the result is the
/// caller's job.
///
/// # Errors
///
/// Returns `DomainError::InvalidTransition` for any pair not in the table.
pub fn transition(
    state: SessionStatus,
    event: LifecycleEvent,
) -> Result<SessionStatus, DomainError> {
    use LifecycleEvent as E;
    use SessionStatus as S;

    match (state, event) {
        (S::Initializing, E::AwaitPlayers) => Ok(S::WaitingForPlayers),
        (S::Initializing | S::WaitingForPlayers, E::QuorumReached) => Ok(S::Active),
        (S::Active, E::Complete) => Ok(S::Completed),
        (S::Initializing | S::WaitingForPlayers | S::Active, E::Quit)
        | (S::Active, E::MissThresholdExceeded)
        | (S::Initializing | S::WaitingForPlayers, E::JoinWindowExpired) => Ok(S::Abandoned),
        _ => Err(DomainError::InvalidTransition {
            from: state.as_str(),
            event: event.as_str(),
        }),
    }
}
