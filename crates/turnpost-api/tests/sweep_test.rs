//! Integration tests for the timeout sweep trigger.

mod common;

use axum::http::StatusCode;
use chrono::Duration;

#[tokio::test]
async fn test_sweep_with_nothing_due_examines_nothing() {
    let test_app = common::build_test_app();
    common::start_session(&test_app, "intimacy", "a@example.com").await;

    let (status, json) =
        common::post_json(test_app.app(), "/api/v1/sweeps", &serde_json::json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["examined"], 0);
    assert_eq!(json["committed"], 0);
}

#[tokio::test]
async fn test_sweep_reminds_then_forces_silent_turn() {
    // Arrange
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;
    common::submit(&test_app, &session_id, "b@example.com", "Hi").await;
    common::submit(&test_app, &session_id, "a@example.com", "Dinner?").await;

    // Act
    test_app.clock.advance(Duration::hours(72));
    let (_, at_deadline) = common::post_json(
        test_app.app(),
        "/api/v1/sweeps",
        &serde_json::json!({ "limit": 10 }),
    )
    .await;
    test_app.clock.advance(Duration::hours(1));
    let (status, after_grace) = common::post_json(
        test_app.app(),
        "/api/v1/sweeps",
        &serde_json::json!({ "limit": 10 }),
    )
    .await;

    // Assert
    assert_eq!(at_deadline["reminders"], 1);
    assert_eq!(at_deadline["resolved"], 0);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after_grace["missed"], 1);
    assert_eq!(after_grace["resolved"], 1);
    assert_eq!(after_grace["failed"], 0);

    let recap = test_app.notifier.deliveries().pop().unwrap();
    assert_eq!(recap.turn_number, Some(2));
    assert!(recap.narrative.contains("Time ran out"));
    assert!(recap.narrative.contains("b@example.com did not answer this turn."));
}
