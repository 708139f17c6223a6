//! Built-in session tools.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::info;
use turnpost_core::error::DomainError;
use turnpost_core::identity::PlayerEmail;
use turnpost_session::application::store::SessionStore;
use turnpost_session::domain::lifecycle::SessionStatus;
use turnpost_session::domain::player::PlayerRole;
use turnpost_session::domain::turn::{Response, Turn};

use crate::registry::{ToolHandler, ToolInvocation};
use crate::schema::{JsonSchema, ToolSchema};

const DEFAULT_HISTORY_LIMIT: usize = 5;
const MAX_HISTORY_LIMIT: i64 = 20;
const DEFAULT_NOTE_REASON: &str = "AI decision";

type BuiltinTool = (ToolSchema, &'static [SessionStatus], Box<dyn ToolHandler>);

fn tool(
    schema: ToolSchema,
    permitted: &'static [SessionStatus],
    handler: impl ToolHandler + 'static,
) -> BuiltinTool {
    (schema, permitted, Box::new(handler))
}

pub(crate) fn builtin_tools() -> Vec<BuiltinTool> {
    use SessionStatus::{Active, Completed, Initializing, WaitingForPlayers};

    vec![
        tool(
            ToolSchema::new(
                "get_session_status",
                "Get the current session status and game state",
            ),
            &SessionStatus::ALL,
            GetSessionStatus,
        ),
        tool(
            ToolSchema::new("get_turn_history", "Get recent turns for context").with_parameter(
                "limit",
                JsonSchema::integer(
                    "Number of recent turns to retrieve (default 5)",
                    1,
                    MAX_HISTORY_LIMIT,
                ),
                false,
            ),
            &[Active, Completed],
            GetTurnHistory,
        ),
        tool(
            ToolSchema::new(
                "check_player_status",
                "Check membership and current-turn response of a player",
            )
            .with_parameter("player_email", JsonSchema::string("Email of the player"), true),
            &[Initializing, WaitingForPlayers, Active],
            CheckPlayerStatus,
        ),
        tool(
            ToolSchema::new(
                "add_player",
                "Invite a player while the session is still gathering players",
            )
            .with_parameter(
                "player_email",
                JsonSchema::string("Email of the player to add"),
                true,
            ),
            &[Initializing, WaitingForPlayers],
            AddPlayer,
        ),
        tool(
            ToolSchema::new("update_game_state", "Record a change to the game state")
                .with_parameter(
                    "state_update",
                    JsonSchema::string("Description of the state change"),
                    true,
                )
                .with_parameter("reason", JsonSchema::string("Reason for the change"), false),
            &[Active],
            UpdateGameState,
        ),
    ]
}

fn string_argument<'m>(arguments: &'m Map<String, Value>, name: &str) -> Option<&'m str> {
    arguments.get(name).and_then(Value::as_str)
}

fn email_argument(arguments: &Map<String, Value>) -> Result<PlayerEmail, DomainError> {
    let raw = string_argument(arguments, "player_email").unwrap_or_default();
    PlayerEmail::parse(raw)
}

struct GetSessionStatus;

#[async_trait]
impl ToolHandler for GetSessionStatus {
    async fn handle(&self, invocation: ToolInvocation<'_>) -> Result<Value, DomainError> {
        let session = SessionStore::new(invocation.repo)
            .get_session(invocation.session_id)
            .await?;
        Ok(json!({
            "status": session.status,
            "game_type": session.game_type,
            "turn_number": session.current_turn_number,
            "player_count": session.players.len(),
            "min_players": session.min_players,
            "max_players": session.max_players,
            "created_at": session.created_at,
            "last_activity": session.updated_at,
        }))
    }
}

struct GetTurnHistory;

fn turn_summary(turn: &Turn) -> Value {
    let contributions: Vec<Value> = turn
        .contributions()
        .map(|(player, contribution)| {
            json!({
                "player_email": player,
                "content": contribution.content,
                "submitted_at": contribution.submitted_at,
                "attachments": contribution
                    .attachments
                    .iter()
                    .map(|a| a.filename.as_str())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    let missed: Vec<&PlayerEmail> = turn
        .responses
        .iter()
        .filter(|(_, response)| matches!(response, Response::Missed { .. }))
        .map(|(player, _)| player)
        .collect();
    json!({
        "turn_number": turn.number,
        "status": turn.status,
        "forced": turn.forced,
        "contributions": contributions,
        "missed": missed,
        "narrative": turn.narrative,
        "completed_at": turn.completed_at,
    })
}

#[async_trait]
impl ToolHandler for GetTurnHistory {
    async fn handle(&self, invocation: ToolInvocation<'_>) -> Result<Value, DomainError> {
        let limit = invocation
            .arguments
            .get("limit")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_HISTORY_LIMIT);
        let session = SessionStore::new(invocation.repo)
            .get_session(invocation.session_id)
            .await?;

        let skip = session.turns.len().saturating_sub(limit);
        let turns: Vec<Value> = session.turns.iter().skip(skip).map(turn_summary).collect();
        Ok(json!({ "turns": turns }))
    }
}

struct CheckPlayerStatus;

#[async_trait]
impl ToolHandler for CheckPlayerStatus {
    async fn handle(&self, invocation: ToolInvocation<'_>) -> Result<Value, DomainError> {
        let email = email_argument(&invocation.arguments)?;
        let session = SessionStore::new(invocation.repo)
            .get_session(invocation.session_id)
            .await?;

        let Some(player) = session.player(&email) else {
            return Ok(json!({ "found": false, "player_email": email }));
        };
        let current_turn = session.current_turn().map(|turn| {
            match turn.responses.get(&email) {
                _ if !turn.required.contains(&email) => "not_required",
                Some(Response::Submitted(_)) => "submitted",
                Some(Response::Missed { .. }) => "missed",
                None => "pending",
            }
        });
        Ok(json!({
            "found": true,
            "player_email": email,
            "role": player.role.as_str(),
            "joined_at": player.joined_at,
            "consecutive_misses": player.consecutive_misses,
            "current_turn": current_turn,
        }))
    }
}

struct AddPlayer;

#[async_trait]
impl ToolHandler for AddPlayer {
    async fn handle(&self, invocation: ToolInvocation<'_>) -> Result<Value, DomainError> {
        let email = email_argument(&invocation.arguments)?;
        let store = SessionStore::new(invocation.repo);
        let mut session = store.get_session(invocation.session_id).await?;

        // The allow-list was computed at bind time; the status may have moved since.
        if !session.status.accepts_new_players() {
            return Err(DomainError::UnauthorizedToolCall {
                tool: "add_player".to_owned(),
                status: session.status.as_str(),
            });
        }
        let added = match session.register_player(
            email.clone(),
            PlayerRole::Invited,
            invocation.correlation_id,
            invocation.clock,
        ) {
            Ok(added) => added,
            Err(DomainError::SessionFull { max_players }) => {
                return Ok(json!({
                    "success": false,
                    "error": "Session is full",
                    "max_players": max_players,
                }));
            }
            Err(err) => return Err(err),
        };
        if !added {
            return Ok(json!({
                "success": false,
                "error": "Player already in session",
                "player_email": email,
            }));
        }

        store.put_session(&mut session).await?;
        info!(
            caller = %invocation.caller,
            player_count = session.players.len(),
            "player invited by narrator"
        );
        Ok(json!({
            "success": true,
            "player_email": email,
            "player_count": session.players.len(),
            "session_status": session.status,
        }))
    }
}

struct UpdateGameState;

#[async_trait]
impl ToolHandler for UpdateGameState {
    async fn handle(&self, invocation: ToolInvocation<'_>) -> Result<Value, DomainError> {
        let state_update = string_argument(&invocation.arguments, "state_update")
            .unwrap_or_default()
            .trim()
            .to_owned();
        if state_update.is_empty() {
            return Err(DomainError::Validation(
                "update_game_state: state_update must not be empty".to_owned(),
            ));
        }
        let reason = string_argument(&invocation.arguments, "reason")
            .unwrap_or(DEFAULT_NOTE_REASON)
            .to_owned();

        let store = SessionStore::new(invocation.repo);
        let mut session = store.get_session(invocation.session_id).await?;
        session.record_note(
            state_update.clone(),
            reason.clone(),
            invocation.correlation_id,
            invocation.clock,
        )?;
        store.put_session(&mut session).await?;
        info!(
            caller = %invocation.caller,
            turn_number = session.current_turn_number,
            "game state note recorded"
        );

        Ok(json!({
            "success": true,
            "action": state_update,
            "reason": reason,
            "turn_number": session.current_turn_number,
            "timestamp": session.updated_at,
        }))
    }
}
