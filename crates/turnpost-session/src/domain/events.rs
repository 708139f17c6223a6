//! Domain events for the session context.
//!
//! Events are emitted by the aggregate while a command is handled and logged
//! when the snapshot that contains their effect is committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turnpost_core::event::{DomainEvent, EventMetadata};
use turnpost_core::identity::{GameType, PlayerEmail};

use super::lifecycle::{LifecycleEvent, SessionStatus};
use super::player::PlayerRole;

/// Emitted when a session is created from a first-contact message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStarted {
    /// The game type.
    pub game_type: GameType,
    /// Who started the session.
    pub initiator: PlayerEmail,
}

/// Emitted when a player is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoined {
    /// The new player.
    pub player: PlayerEmail,
    /// How the player was added.
    pub role: PlayerRole,
}

/// Emitted when an onboarding message is stored in the lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyContributionRecorded {
    /// The sender.
    pub player: PlayerEmail,
}

/// Emitted on every lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
    /// Previous status.
    pub from: SessionStatus,
    /// New status.
    pub to: SessionStatus,
    /// The triggering lifecycle event.
    pub cause: LifecycleEvent,
}

/// Emitted when a turn opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOpened {
    /// The new turn.
    pub turn_number: u32,
    /// Its deadline.
    pub deadline: DateTime<Utc>,
    /// Number of required responders.
    pub required: usize,
}

/// Emitted when a contribution is stored or replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionRecorded {
    /// The turn.
    pub turn_number: u32,
    /// The contributor.
    pub player: PlayerEmail,
    /// Whether an earlier contribution was replaced.
    pub overwritten: bool,
}

/// Emitted when a turn is claimed for narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnProcessingStarted {
    /// The claimed turn.
    pub turn_number: u32,
    /// Whether the timeout policy forced the claim.
    pub forced: bool,
}

/// Emitted when an expired processing claim is renewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReclaimed {
    /// The reclaimed turn.
    pub turn_number: u32,
}

/// Emitted when narration for a turn is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnCompleted {
    /// The completed turn.
    pub turn_number: u32,
}

/// Emitted when a reminder marker is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderMarked {
    /// The turn.
    pub turn_number: u32,
    /// The reminded player.
    pub player: PlayerEmail,
    /// `false` when the reminder window lapsed without a sweep.
    pub sent: bool,
}

/// Emitted when a silent player is marked missed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMissed {
    /// The turn.
    pub turn_number: u32,
    /// The silent player.
    pub player: PlayerEmail,
    /// The player's miss streak after this miss.
    pub consecutive_misses: u32,
}

/// Emitted when the narrator records a state note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarratorNoteRecorded {
    /// Turn the note was recorded during.
    pub turn_number: u32,
    /// Why the narrator changed state.
    pub reason: String,
}

/// Event type identifier for [`SessionStarted`].
pub const SESSION_STARTED_EVENT_TYPE: &str = "session.started";

/// Event type identifier for [`PlayerJoined`].
pub const PLAYER_JOINED_EVENT_TYPE: &str = "session.player_joined";

/// Event type identifier for [`LobbyContributionRecorded`].
pub const LOBBY_CONTRIBUTION_RECORDED_EVENT_TYPE: &str = "session.lobby_contribution_recorded";

/// Event type identifier for [`StatusChanged`].
pub const STATUS_CHANGED_EVENT_TYPE: &str = "session.status_changed";

/// Event type identifier for [`TurnOpened`].
pub const TURN_OPENED_EVENT_TYPE: &str = "session.turn_opened";

/// Event type identifier for [`ContributionRecorded`].
pub const CONTRIBUTION_RECORDED_EVENT_TYPE: &str = "session.contribution_recorded";

/// Event type identifier for [`TurnProcessingStarted`].
pub const TURN_PROCESSING_STARTED_EVENT_TYPE: &str = "session.turn_processing_started";

/// Event type identifier for [`TurnReclaimed`].
pub const TURN_RECLAIMED_EVENT_TYPE: &str = "session.turn_reclaimed";

/// Event type identifier for [`TurnCompleted`].
pub const TURN_COMPLETED_EVENT_TYPE: &str = "session.turn_completed";

/// Event type identifier for [`ReminderMarked`].
pub const REMINDER_MARKED_EVENT_TYPE: &str = "session.reminder_marked";

/// Event type identifier for [`ResponseMissed`].
pub const RESPONSE_MISSED_EVENT_TYPE: &str = "session.response_missed";

/// Event type identifier for [`NarratorNoteRecorded`].
pub const NARRATOR_NOTE_RECORDED_EVENT_TYPE: &str = "session.narrator_note_recorded";

/// Event payload variants for the session context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEventKind {
    /// A session was created.
    SessionStarted(SessionStarted),
    /// A player was added.
    PlayerJoined(PlayerJoined),
    /// An onboarding message was stored.
    LobbyContributionRecorded(LobbyContributionRecorded),
    /// The lifecycle status changed.
    StatusChanged(StatusChanged),
    /// A turn opened.
    TurnOpened(TurnOpened),
    /// A contribution was stored.
    ContributionRecorded(ContributionRecorded),
    /// A turn was claimed for narration.
    TurnProcessingStarted(TurnProcessingStarted),
    /// An expired claim was renewed.
    TurnReclaimed(TurnReclaimed),
    /// Narration was committed.
    TurnCompleted(TurnCompleted),
    /// A reminder marker was written.
    ReminderMarked(ReminderMarked),
    /// A silent player was marked missed.
    ResponseMissed(ResponseMissed),
    /// The narrator recorded a state note.
    NarratorNoteRecorded(NarratorNoteRecorded),
}

/// Domain event envelope for the session context.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: SessionEventKind,
}

impl SessionEventKind {
    /// Dotted type name of the payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted(_) => SESSION_STARTED_EVENT_TYPE,
            Self::PlayerJoined(_) => PLAYER_JOINED_EVENT_TYPE,
            Self::LobbyContributionRecorded(_) => LOBBY_CONTRIBUTION_RECORDED_EVENT_TYPE,
            Self::StatusChanged(_) => STATUS_CHANGED_EVENT_TYPE,
            Self::TurnOpened(_) => TURN_OPENED_EVENT_TYPE,
            Self::ContributionRecorded(_) => CONTRIBUTION_RECORDED_EVENT_TYPE,
            Self::TurnProcessingStarted(_) => TURN_PROCESSING_STARTED_EVENT_TYPE,
            Self::TurnReclaimed(_) => TURN_RECLAIMED_EVENT_TYPE,
            Self::TurnCompleted(_) => TURN_COMPLETED_EVENT_TYPE,
            Self::ReminderMarked(_) => REMINDER_MARKED_EVENT_TYPE,
            Self::ResponseMissed(_) => RESPONSE_MISSED_EVENT_TYPE,
            Self::NarratorNoteRecorded(_) => NARRATOR_NOTE_RECORDED_EVENT_TYPE,
        }
    }
}

impl DomainEvent for SessionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("SessionEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
