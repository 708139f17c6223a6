//! Routes for sessions: first contact, inbound submissions, completion, the
//! read-only view and the journal.

use std::sync::PoisonError;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use turnpost_coordinator::{Dispatcher, SubmissionOutcome};
use turnpost_core::identity::{GameType, PlayerEmail, SessionId};
use turnpost_core::rng::SystemRng;
use turnpost_session::application::{command_handlers, query_handlers};
use turnpost_session::domain::aggregates::Progress;
use turnpost_session::domain::commands::{
    CompleteSession, StartSession, SubmissionKind, SubmitContribution,
};
use turnpost_session::domain::lifecycle::SessionStatus;
use turnpost_session::domain::turn::{AttachmentMeta, RecordOutcome};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub game_type: String,
    /// Sender of the first-contact message.
    pub initiator: String,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKindRequest {
    #[default]
    Contribution,
    Quit,
}

/// Request body for POST /{session_id}/submissions.
#[derive(Debug, Deserialize)]
pub struct SubmissionRequest {
    pub player_email: String,
    /// Turn the message answers; the current turn when absent.
    #[serde(default)]
    pub turn_number: Option<u32>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
    #[serde(default)]
    pub kind: SubmissionKindRequest,
}

/// Where the session stands, as reported to the caller.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressView {
    AwaitingPlayers {
        needed: u32,
    },
    Waiting {
        turn_number: u32,
        pending: Vec<PlayerEmail>,
    },
    Processing {
        turn_number: u32,
    },
    Closed {
        status: SessionStatus,
    },
}

impl From<Progress> for ProgressView {
    fn from(progress: Progress) -> Self {
        match progress {
            Progress::AwaitingPlayers { needed } => Self::AwaitingPlayers { needed },
            Progress::Waiting {
                turn_number,
                pending,
            } => Self::Waiting {
                turn_number,
                pending,
            },
            Progress::Claimed { turn_number } => Self::Processing { turn_number },
            Progress::Closed(status) => Self::Closed { status },
        }
    }
}

/// Response body for session starts and submissions.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub session_id: SessionId,
    /// `recorded`, `overwritten`, or `duplicate`; absent for a quit.
    pub recorded: Option<&'static str>,
    pub progress: ProgressView,
    /// Turn narrated during this request.
    pub resolved_turn: Option<u32>,
    pub next_turn: Option<u32>,
    pub tool_calls: usize,
}

fn recorded_label(outcome: RecordOutcome) -> &'static str {
    match outcome {
        RecordOutcome::Recorded => "recorded",
        RecordOutcome::Overwritten => "overwritten",
        RecordOutcome::Duplicate => "duplicate",
    }
}

impl From<SubmissionOutcome> for SubmissionResponse {
    fn from(outcome: SubmissionOutcome) -> Self {
        Self {
            session_id: outcome.session_id,
            recorded: outcome.recorded.map(recorded_label),
            progress: outcome.progress.into(),
            resolved_turn: outcome.resolution.as_ref().map(|r| r.turn_number),
            next_turn: outcome.resolution.and_then(|r| r.next_turn),
            tool_calls: outcome.tool_calls.len(),
        }
    }
}

fn session_id_from(raw: &str) -> Result<SessionId, ApiError> {
    Ok(SessionId::parse(raw)?)
}

/// POST /
#[instrument(skip(state, request), fields(game_type = %request.game_type))]
async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    let command = StartSession {
        correlation_id: Uuid::new_v4(),
        game_type: GameType::parse(&request.game_type)?,
        initiator: PlayerEmail::parse(&request.initiator)?,
        content: request.content,
        attachments: request.attachments,
    };
    let profile = state.profile(&command.game_type)?;

    info!(correlation_id = %command.correlation_id, "handling start_session command");

    // The shared RNG only seeds a per-request one; no lock is held across awaits.
    let seed = {
        let mut rng = state.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (u64::from(rng.next_u32_range(0, u32::MAX)) << 32)
            | u64::from(rng.next_u32_range(0, u32::MAX))
    };
    let mut rng = SystemRng::seeded(seed);

    let outcome = state
        .coordinator()
        .start_session(&command, profile, &mut rng)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// GET /{session_id}
#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<query_handlers::SessionView>, ApiError> {
    let session_id = session_id_from(&session_id)?;
    let view = query_handlers::get_session_by_id(&session_id, state.repository.as_ref()).await?;
    Ok(Json(view))
}

/// GET /{session_id}/events
#[instrument(skip(state))]
async fn get_session_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<query_handlers::EventView>>, ApiError> {
    let session_id = session_id_from(&session_id)?;
    let events =
        query_handlers::get_session_events(&session_id, state.repository.as_ref()).await?;
    Ok(Json(events))
}

/// POST /{session_id}/complete
#[instrument(skip(state))]
async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<query_handlers::SessionView>, ApiError> {
    let command = CompleteSession {
        correlation_id: Uuid::new_v4(),
        session_id: session_id_from(&session_id)?,
    };

    info!(correlation_id = %command.correlation_id, "handling complete_session command");

    let result = command_handlers::handle_complete_session(
        &command,
        state.clock.as_ref(),
        state.repository.as_ref(),
    )
    .await?;

    Ok(Json(query_handlers::SessionView::from(&result.session)))
}

/// POST /{session_id}/submissions
#[instrument(skip(state, request))]
async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SubmissionRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let command = SubmitContribution {
        correlation_id: Uuid::new_v4(),
        session_id: session_id_from(&session_id)?,
        player_email: PlayerEmail::parse(&request.player_email)?,
        turn_number: request.turn_number,
        content: request.content,
        attachments: request.attachments,
        kind: match request.kind {
            SubmissionKindRequest::Contribution => SubmissionKind::Contribution,
            SubmissionKindRequest::Quit => SubmissionKind::Quit,
        },
    };

    info!(correlation_id = %command.correlation_id, "handling submission");

    let outcome = Dispatcher::new(state.coordinator(), state.retry_policy)
        .dispatch(&command)
        .await?;

    Ok(Json(outcome.into()))
}

/// Returns the router for sessions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/{session_id}", get(get_session))
        .route("/{session_id}/events", get(get_session_events))
        .route("/{session_id}/complete", post(complete_session))
        .route("/{session_id}/submissions", post(submit))
}
