//! The narrator seam: a model invoked with a turn context and a gateway.

use async_trait::async_trait;
use serde::Serialize;
use turnpost_core::error::DomainError;
use turnpost_core::identity::{GameType, PlayerEmail};
use turnpost_session::domain::aggregates::Session;
use turnpost_session::domain::turn::{AttachmentMeta, Contribution, Response};

use crate::gateway::ToolGateway;

/// Why the narrator is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum NarrationPhase {
    /// The session is still gathering players.
    Onboarding,
    /// A claimed turn is being resolved.
    Turn { turn_number: u32, forced: bool },
}

/// One player's input as the narrator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionView {
    pub player: PlayerEmail,
    pub content: String,
    pub attachments: Vec<AttachmentMeta>,
}

impl ContributionView {
    fn new(player: &PlayerEmail, contribution: &Contribution) -> Self {
        Self {
            player: player.clone(),
            content: contribution.content.clone(),
            attachments: contribution.attachments.clone(),
        }
    }
}

/// Everything the narrator gets to write one message. Carries no session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnContext {
    /// Game type, selects the narrator prompt.
    pub game_type: GameType,
    /// Onboarding reply or turn resolution.
    pub phase: NarrationPhase,
    /// Every player in join order.
    pub players: Vec<PlayerEmail>,
    /// Contributions to narrate, or the lobby messages during onboarding.
    pub contributions: Vec<ContributionView>,
    /// Players marked missed on this turn.
    pub missed: Vec<PlayerEmail>,
    /// Narrative of the previous turn, if any.
    pub previous_narrative: Option<String>,
}

impl TurnContext {
    /// Context for resolving `turn_number`, or `None` if the session has no
    /// such turn.
    #[must_use]
    pub fn for_turn(session: &Session, turn_number: u32) -> Option<Self> {
        let turn = session.turn(turn_number)?;
        let previous_narrative = turn_number
            .checked_sub(1)
            .and_then(|n| session.turn(n))
            .and_then(|t| t.narrative.clone());
        Some(Self {
            game_type: session.game_type.clone(),
            phase: NarrationPhase::Turn {
                turn_number,
                forced: turn.forced,
            },
            players: session.player_emails(),
            contributions: turn
                .contributions()
                .map(|(player, c)| ContributionView::new(player, c))
                .collect(),
            missed: turn
                .responses
                .iter()
                .filter(|(_, r)| matches!(r, Response::Missed { .. }))
                .map(|(player, _)| player.clone())
                .collect(),
            previous_narrative,
        })
    }

    /// Context for an onboarding reply, built from the lobby.
    #[must_use]
    pub fn onboarding(session: &Session) -> Self {
        Self {
            game_type: session.game_type.clone(),
            phase: NarrationPhase::Onboarding,
            players: session.player_emails(),
            contributions: session
                .lobby
                .iter()
                .map(|(player, c)| ContributionView::new(player, c))
                .collect(),
            missed: Vec::new(),
            previous_narrative: None,
        }
    }
}

/// What the narrator produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarratorOutput {
    pub narrative: String,
    /// The story reached its end; complete the session.
    pub end_session: bool,
}

/// Generates the narrative for one invocation. Tool calls go through the
/// gateway, which is already bound to the session.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` when the model cannot be
    /// reached, or any error the implementation chooses to surface.
    async fn generate(
        &self,
        context: &TurnContext,
        gateway: &ToolGateway<'_>,
    ) -> Result<NarratorOutput, DomainError>;
}
