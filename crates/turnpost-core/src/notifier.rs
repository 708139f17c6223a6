//! Outbound notification port.
//!
//! Email transport and template rendering live outside this workspace; the
//! coordinator and scheduler only hand over what needs to be said to whom.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::identity::{GameType, PlayerEmail, SessionId};

/// A reminder that a player's response is overdue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Session the reminder belongs to. Used for reply routing only.
    pub session_id: SessionId,
    /// Game type, selects the template.
    pub game_type: GameType,
    /// Turn awaiting the response.
    pub turn_number: u32,
    /// Recipient.
    pub player: PlayerEmail,
    /// The deadline that has passed.
    pub deadline: DateTime<Utc>,
}

/// Narrator output fanned out to every player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeDelivery {
    /// Session the narrative belongs to. Used for reply routing only.
    pub session_id: SessionId,
    /// Game type, selects the template.
    pub game_type: GameType,
    /// Resolved turn, `None` for onboarding replies.
    pub turn_number: Option<u32>,
    /// Recipients.
    pub recipients: Vec<PlayerEmail>,
    /// Narrative text.
    pub narrative: String,
}

/// Announcement that a session went live on a turn nobody narrated yet,
/// because some invited player still has to write in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOpening {
    /// Session that went live. Used for reply routing only.
    pub session_id: SessionId,
    /// Game type, selects the template.
    pub game_type: GameType,
    /// The open turn.
    pub turn_number: u32,
    /// When the turn times out.
    pub deadline: DateTime<Utc>,
    /// Every player in the session.
    pub recipients: Vec<PlayerEmail>,
    /// Players the turn still waits for.
    pub pending: Vec<PlayerEmail>,
}

/// Port for outbound messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an overdue-turn reminder.
    async fn send_reminder(&self, reminder: &Reminder) -> Result<(), DomainError>;

    /// Deliver narrator output.
    async fn deliver_narrative(&self, delivery: &NarrativeDelivery) -> Result<(), DomainError>;

    /// Announce a turn that opened without a narrative.
    async fn announce_turn(&self, opening: &TurnOpening) -> Result<(), DomainError>;

    /// Tell a sender their message could not be processed.
    async fn send_failure_notice(
        &self,
        recipient: &PlayerEmail,
        message: &str,
    ) -> Result<(), DomainError>;
}
