//! Timeout sweep trigger, called by an external scheduler.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use turnpost_coordinator::SweepReport;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_SWEEP_LIMIT: usize = 50;
const MAX_SWEEP_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct SweepRequest {
    /// Sessions to sweep in this call.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub examined: usize,
    pub committed: usize,
    pub reminders: usize,
    pub missed: usize,
    pub resolved: usize,
    pub abandoned: usize,
    pub failed: usize,
}

impl From<SweepReport> for SweepResponse {
    fn from(report: SweepReport) -> Self {
        Self {
            examined: report.examined,
            committed: report.committed,
            reminders: report.reminders,
            missed: report.missed,
            resolved: report.resolved,
            abandoned: report.abandoned,
            failed: report.failed,
        }
    }
}

/// POST /
#[instrument(skip(state, request))]
async fn sweep(
    State(state): State<AppState>,
    Json(request): Json<SweepRequest>,
) -> Result<Json<SweepResponse>, ApiError> {
    let limit = request
        .limit
        .unwrap_or(DEFAULT_SWEEP_LIMIT)
        .clamp(1, MAX_SWEEP_LIMIT);
    let correlation_id = Uuid::new_v4();

    info!(%correlation_id, limit, "handling sweep");

    let report = state.coordinator().sweep_due(limit, correlation_id).await?;
    Ok(Json(report.into()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(sweep))
}
