//! Built-in narrator used when no model is attached.
//!
//! Writes a plain recap of the turn so that the coordination flow runs end
//! to end without a language model.

use async_trait::async_trait;
use serde_json::Value;
use turnpost_core::error::DomainError;
use turnpost_gateway::{NarrationPhase, Narrator, NarratorOutput, ToolGateway, TurnContext};

/// Recaps contributions verbatim. Never ends a session on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecapNarrator;

#[async_trait]
impl Narrator for RecapNarrator {
    async fn generate(
        &self,
        context: &TurnContext,
        gateway: &ToolGateway<'_>,
    ) -> Result<NarratorOutput, DomainError> {
        let narrative = match context.phase {
            NarrationPhase::Onboarding => {
                let status = gateway
                    .call_for_model("get_session_status", Value::Null)
                    .await;
                welcome(context, &status)
            }
            NarrationPhase::Turn {
                turn_number,
                forced,
            } => recap(context, turn_number, forced),
        };
        Ok(NarratorOutput {
            narrative,
            end_session: false,
        })
    }
}

fn welcome(context: &TurnContext, status: &Value) -> String {
    let joined = status["player_count"].as_u64().unwrap_or(0);
    let needed = status["min_players"]
        .as_u64()
        .unwrap_or(0)
        .saturating_sub(joined);
    if needed == 0 {
        return format!(
            "Welcome to {}. Everyone is here; the first turn is open.",
            context.game_type
        );
    }
    format!(
        "Welcome to {}. {joined} joined so far, waiting for {needed} more before the first turn.",
        context.game_type
    )
}

fn recap(context: &TurnContext, turn_number: u32, forced: bool) -> String {
    let mut lines = vec![format!("Turn {turn_number} of your {} story.", context.game_type)];
    if forced {
        lines.push("Time ran out before everyone answered.".to_owned());
    }
    for contribution in &context.contributions {
        lines.push(format!(
            "{}: {}",
            contribution.player,
            contribution.content.trim()
        ));
    }
    for player in &context.missed {
        lines.push(format!("{player} did not answer this turn."));
    }
    lines.push("Reply to this message with your next move.".to_owned());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use turnpost_core::identity::{GameType, PlayerEmail, SessionId};
    use turnpost_gateway::narrator::ContributionView;
    use turnpost_gateway::{Caller, SecurityContext, ToolRegistry};
    use turnpost_session::application::store::SessionStore;
    use turnpost_session::domain::aggregates::Session;
    use turnpost_session::domain::timeouts::{GameProfile, TimeoutConfig};
    use turnpost_session::domain::turn::Contribution;
    use turnpost_store::InMemorySessionRepository;
    use turnpost_test_support::FixedClock;
    use uuid::Uuid;

    use super::*;

    fn email(raw: &str) -> PlayerEmail {
        PlayerEmail::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_onboarding_reply_counts_missing_players_through_the_gateway() {
        // Arrange
        let repo = InMemorySessionRepository::new();
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let mut session = Session::start(
            SessionId::parse("K7mPq2Rs9TzX").unwrap(),
            &GameProfile::intimacy(TimeoutConfig::default()),
            email("a@example.com"),
            Contribution {
                content: "Hello".to_owned(),
                submitted_at: clock.0,
                attachments: Vec::new(),
            },
            Uuid::new_v4(),
            &clock,
        );
        session.settle_membership(Uuid::new_v4(), &clock).unwrap();
        SessionStore::new(&repo).put_session(&mut session).await.unwrap();
        let security =
            SecurityContext::bind(&session, Caller::Player(email("a@example.com")), &registry);
        let gateway = ToolGateway::bind(security, &registry, &repo, &clock, Uuid::new_v4());

        // Act
        let output = RecapNarrator
            .generate(&TurnContext::onboarding(&session), &gateway)
            .await
            .unwrap();

        // Assert
        assert!(output.narrative.contains("waiting for 1 more"));
        assert!(!output.narrative.contains("K7mPq2Rs9TzX"));
        assert!(!output.end_session);
        assert_eq!(gateway.records().len(), 1);
    }

    #[tokio::test]
    async fn test_turn_recap_lists_contributions_and_missed_players() {
        // Arrange
        let repo = InMemorySessionRepository::new();
        let registry = ToolRegistry::new();
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let gateway = ToolGateway::unbound(&registry, &repo, &clock);
        let context = TurnContext {
            game_type: GameType::from_static("dungeon"),
            phase: NarrationPhase::Turn {
                turn_number: 4,
                forced: true,
            },
            players: vec![email("a@example.com"), email("b@example.com")],
            contributions: vec![ContributionView {
                player: email("a@example.com"),
                content: "  I light the torch ".to_owned(),
                attachments: Vec::new(),
            }],
            missed: vec![email("b@example.com")],
            previous_narrative: None,
        };

        // Act
        let output = RecapNarrator.generate(&context, &gateway).await.unwrap();

        // Assert
        let lines: Vec<&str> = output.narrative.lines().collect();
        assert_eq!(lines[0], "Turn 4 of your dungeon story.");
        assert_eq!(lines[1], "Time ran out before everyone answered.");
        assert_eq!(lines[2], "a@example.com: I light the torch");
        assert_eq!(lines[3], "b@example.com did not answer this turn.");
    }
}
