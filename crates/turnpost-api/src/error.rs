//! Turnpost: API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use turnpost_core::error::DomainError;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store could not be prepared.
    #[error("storage error: {0}")]
    Storage(#[from] DomainError),

    /// Tracing or exporter setup failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Message safe to show to the caller.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::ConcurrencyConflict { .. }
        | DomainError::InvalidTransition { .. }
        | DomainError::StaleTurn { .. }
        | DomainError::TurnClosed(_)
        | DomainError::SessionFull { .. } => StatusCode::CONFLICT,
        DomainError::PlayerNotRecognized(_) | DomainError::UnauthorizedToolCall { .. } => {
            StatusCode::FORBIDDEN
        }
        DomainError::UnknownTool(_)
        | DomainError::ForbiddenParameter { .. }
        | DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::TimeoutPolicyViolation(_) | DomainError::Infrastructure(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        // Full detail stays in the log; the body carries the public message only.
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            warn!(code = self.0.code(), error = %self.0, "request rejected");
        }

        let body = ErrorBody {
            error: self.0.code(),
            message: self.0.public_message(),
        };

        (status, Json(body)).into_response()
    }
}
