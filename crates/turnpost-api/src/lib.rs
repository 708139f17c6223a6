//! Turnpost: HTTP surface for the turn coordination engine.

pub mod config;
pub mod error;
pub mod narrator;
pub mod notifier;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full router. `main` adds CORS on top.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/sessions", routes::session::router())
        .nest("/api/v1/sweeps", routes::sweep::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
