//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use turnpost_api::state::AppState;
use turnpost_coordinator::RetryPolicy;
use turnpost_core::repository::SessionRepository;
use turnpost_core::rng::DeterministicRng;
use turnpost_gateway::ToolRegistry;
use turnpost_session::domain::timeouts::{GameProfile, TimeoutConfig};
use turnpost_store::{InMemorySessionRepository, PgSessionRepository};
use turnpost_test_support::{ManualClock, RecordingNotifier, SequenceRng};

/// Fixed timestamp every scenario starts at.
pub fn opened_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// The app plus handles on the collaborators a test steers or inspects.
pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    /// A fresh handle on the router for one request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full app over the in-memory store with a manual clock and a
/// recording notifier. Uses the same router as `main.rs`.
pub fn build_test_app() -> TestApp {
    build_test_app_with_repository(Arc::new(InMemorySessionRepository::new()))
}

/// Build the full app over a real `PgSessionRepository`.
pub fn build_test_app_with_pool(pool: PgPool) -> TestApp {
    build_test_app_with_repository(Arc::new(PgSessionRepository::new(pool)))
}

fn build_test_app_with_repository(repository: Arc<dyn SessionRepository>) -> TestApp {
    let clock = Arc::new(ManualClock::new(opened_at()));
    let notifier = Arc::new(RecordingNotifier::new());
    // Distinct seeds per start, so every session gets its own id.
    let rng: Arc<Mutex<dyn DeterministicRng>> =
        Arc::new(Mutex::new(SequenceRng::new((1..=64).collect())));
    let profiles = vec![
        GameProfile::dungeon(TimeoutConfig::default()),
        GameProfile::intimacy(TimeoutConfig::default()),
    ];
    let app_state = AppState::new(
        repository,
        clock.clone(),
        rng,
        ToolRegistry::with_builtin_tools().unwrap(),
        profiles,
    )
    .with_notifier(notifier.clone())
    .with_retry_policy(RetryPolicy {
        max_attempts: 2,
        initial_backoff: std::time::Duration::ZERO,
        max_backoff: std::time::Duration::ZERO,
    });

    TestApp {
        router: turnpost_api::app(app_state),
        clock,
        notifier,
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Starts a session and returns its id.
pub async fn start_session(test_app: &TestApp, game_type: &str, initiator: &str) -> String {
    let (status, json) = post_json(
        test_app.app(),
        "/api/v1/sessions",
        &serde_json::json!({
            "game_type": game_type,
            "initiator": initiator,
            "content": "Let's play",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "start failed: {json}");
    json["session_id"].as_str().unwrap().to_owned()
}

/// Submits a contribution to the current turn.
pub async fn submit(
    test_app: &TestApp,
    session_id: &str,
    player: &str,
    content: &str,
) -> (StatusCode, serde_json::Value) {
    post_json(
        test_app.app(),
        &format!("/api/v1/sessions/{session_id}/submissions"),
        &serde_json::json!({ "player_email": player, "content": content }),
    )
    .await
}
