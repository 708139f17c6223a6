//! Shared helpers for coordinator integration tests.
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use turnpost_core::error::DomainError;
use turnpost_core::identity::{GameType, PlayerEmail, SessionId};
use turnpost_gateway::{
    NarrationPhase, Narrator, NarratorOutput, ToolGateway, ToolRegistry, TurnContext,
};
use turnpost_session::domain::commands::{StartSession, SubmissionKind, SubmitContribution};
use turnpost_session::domain::timeouts::{GameProfile, TimeoutConfig};
use uuid::Uuid;

/// Fixed timestamp every scenario starts at.
pub fn opened_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

pub fn email(raw: &str) -> PlayerEmail {
    PlayerEmail::parse(raw).unwrap()
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::with_builtin_tools().unwrap()
}

pub fn dungeon() -> GameProfile {
    GameProfile::dungeon(TimeoutConfig::default())
}

pub fn intimacy() -> GameProfile {
    GameProfile::intimacy(TimeoutConfig::default())
}

/// Parlour game: three to four players, so one invitation plus one joiner
/// is enough to go live.
pub fn parlour() -> GameProfile {
    GameProfile {
        game_type: GameType::from_static("parlour"),
        min_players: 3,
        max_players: 4,
        timeouts: TimeoutConfig::default(),
    }
}

pub fn start(game_type: &'static str, initiator: &str, content: &str) -> StartSession {
    StartSession {
        correlation_id: Uuid::new_v4(),
        game_type: GameType::from_static(game_type),
        initiator: email(initiator),
        content: content.to_owned(),
        attachments: Vec::new(),
    }
}

/// A contribution to the current turn.
pub fn submission(session_id: &SessionId, player: &str, content: &str) -> SubmitContribution {
    SubmitContribution {
        correlation_id: Uuid::new_v4(),
        session_id: session_id.clone(),
        player_email: email(player),
        turn_number: None,
        content: content.to_owned(),
        attachments: Vec::new(),
        kind: SubmissionKind::Contribution,
    }
}

pub fn quit(session_id: &SessionId, player: &str) -> SubmitContribution {
    SubmitContribution {
        kind: SubmissionKind::Quit,
        ..submission(session_id, player, "quit")
    }
}

/// A narrator that replays a fixed script: it makes the scripted tool calls
/// through the gateway, then returns the same narrative every time.
#[derive(Debug, Default)]
pub struct ScriptedNarrator {
    narrative: String,
    end_session: bool,
    tool_calls: Vec<(String, Value)>,
    failing: bool,
    contexts: Mutex<Vec<TurnContext>>,
}

impl ScriptedNarrator {
    pub fn new(narrative: &str) -> Self {
        Self {
            narrative: narrative.to_owned(),
            ..Self::default()
        }
    }

    /// Every invocation ends the story.
    pub fn ending(mut self) -> Self {
        self.end_session = true;
        self
    }

    pub fn with_tool_call(mut self, tool: &str, arguments: Value) -> Self {
        self.tool_calls.push((tool.to_owned(), arguments));
        self
    }

    /// Every invocation fails as if the model were unreachable.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn contexts(&self) -> Vec<TurnContext> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    /// Invocations that narrated `turn_number`.
    pub fn turn_invocations(&self, turn_number: u32) -> usize {
        self.contexts()
            .iter()
            .filter(|context| {
                matches!(context.phase, NarrationPhase::Turn { turn_number: n, .. } if n == turn_number)
            })
            .count()
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn generate(
        &self,
        context: &TurnContext,
        gateway: &ToolGateway<'_>,
    ) -> Result<NarratorOutput, DomainError> {
        self.contexts.lock().unwrap().push(context.clone());
        for (tool, arguments) in &self.tool_calls {
            gateway.call_for_model(tool, arguments.clone()).await;
        }
        if self.failing {
            return Err(DomainError::Infrastructure("model unavailable".into()));
        }
        Ok(NarratorOutput {
            narrative: self.narrative.clone(),
            end_session: self.end_session,
        })
    }
}
