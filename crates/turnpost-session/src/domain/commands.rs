//! Commands for the session context.

use turnpost_core::identity::{GameType, PlayerEmail, SessionId};
use uuid::Uuid;

use super::turn::AttachmentMeta;

/// Command to start a session from a first-contact message.
#[derive(Debug, Clone)]
pub struct StartSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Game type, selects the profile.
    pub game_type: GameType,
    /// Sender of the first-contact message.
    pub initiator: PlayerEmail,
    /// Opening message body.
    pub content: String,
    /// Attachment metadata of the opening message.
    pub attachments: Vec<AttachmentMeta>,
}

/// Whether an inbound message is a contribution or a request to leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionKind {
    /// An ordinary turn or onboarding message.
    #[default]
    Contribution,
    /// The sender quits; the session is abandoned.
    Quit,
}

/// Command carrying one validated inbound message.
#[derive(Debug, Clone)]
pub struct SubmitContribution {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Session resolved from the envelope.
    pub session_id: SessionId,
    /// Sender.
    pub player_email: PlayerEmail,
    /// Turn the message answers; `None` means the current turn.
    pub turn_number: Option<u32>,
    /// Message body.
    pub content: String,
    /// Attachment metadata.
    pub attachments: Vec<AttachmentMeta>,
    /// Contribution or quit.
    pub kind: SubmissionKind,
}

/// Command to complete an active session explicitly.
#[derive(Debug, Clone)]
pub struct CompleteSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session to complete.
    pub session_id: SessionId,
}
