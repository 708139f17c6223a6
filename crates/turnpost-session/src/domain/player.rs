//! Session membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turnpost_core::identity::PlayerEmail;

/// How a player came to be in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    /// Sent the first-contact message.
    Initiator,
    /// Added by the narrator's `add_player` tool.
    Invited,
    /// Joined by writing in during onboarding.
    Joined,
}

impl PlayerRole {
    /// The snake_case name used in tool results.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Invited => "invited",
            Self::Joined => "joined",
        }
    }
}

/// A player of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Normalized email identity.
    pub email: PlayerEmail,
    /// When the player was added.
    pub joined_at: DateTime<Utc>,
    /// How the player was added.
    pub role: PlayerRole,
    /// Turns missed in a row; reset by any submission.
    #[serde(default)]
    pub consecutive_misses: u32,
}

impl Player {
    /// Creates a player with a clean miss record.
    #[must_use]
    pub fn new(email: PlayerEmail, role: PlayerRole, joined_at: DateTime<Utc>) -> Self {
        Self {
            email,
            joined_at,
            role,
            consecutive_misses: 0,
        }
    }
}
