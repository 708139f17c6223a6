//! Integration tests for the session routes.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

#[tokio::test]
async fn test_start_intimacy_session_waits_for_second_player() {
    // Arrange
    let test_app = common::build_test_app();

    // Act
    let (status, json) = common::post_json(
        test_app.app(),
        "/api/v1/sessions",
        &serde_json::json!({
            "game_type": "intimacy",
            "initiator": "A@Example.com",
            "content": "Shall we?",
        }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["session_id"].as_str().unwrap().len(), 12);
    assert_eq!(json["recorded"], "recorded");
    assert_eq!(json["progress"]["state"], "awaiting_players");
    assert_eq!(json["progress"]["needed"], 1);
    assert!(json["resolved_turn"].is_null());

    let welcome = test_app.notifier.deliveries().pop().unwrap();
    assert_eq!(welcome.turn_number, None);
    assert!(welcome.narrative.contains("waiting for 1 more"));
}

#[tokio::test]
async fn test_start_dungeon_session_narrates_turn_one_at_once() {
    let test_app = common::build_test_app();

    let (status, json) = common::post_json(
        test_app.app(),
        "/api/v1/sessions",
        &serde_json::json!({
            "game_type": "dungeon",
            "initiator": "a@example.com",
            "content": "I light a torch",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["resolved_turn"], 1);
    assert_eq!(json["next_turn"], 2);
    let recap = test_app.notifier.deliveries().pop().unwrap();
    assert_eq!(recap.turn_number, Some(1));
    assert!(recap.narrative.contains("a@example.com: I light a torch"));
}

#[tokio::test]
async fn test_start_unknown_game_type_returns_400() {
    let test_app = common::build_test_app();

    let (status, json) = common::post_json(
        test_app.app(),
        "/api/v1/sessions",
        &serde_json::json!({
            "game_type": "chess",
            "initiator": "a@example.com",
            "content": "e4",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_second_player_activates_session_and_turn_one_is_narrated() {
    // Arrange
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;

    // Act
    let (status, json) =
        common::submit(&test_app, &session_id, "b@example.com", "Hi, I'm in").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["recorded"], "recorded");
    assert_eq!(json["resolved_turn"], 1);
    assert_eq!(json["next_turn"], 2);

    let (status, view) =
        common::get_json(test_app.app(), &format!("/api/v1/sessions/{session_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "active");
    assert_eq!(view["players"].as_array().unwrap().len(), 2);
    assert_eq!(view["current_turn"]["turn_number"], 2);
}

#[tokio::test]
async fn test_duplicate_submission_is_reported_and_changes_nothing() {
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;
    common::submit(&test_app, &session_id, "b@example.com", "Hi").await;
    common::submit(&test_app, &session_id, "a@example.com", "Dinner?").await;
    let uri = format!("/api/v1/sessions/{session_id}");
    let (_, before) = common::get_json(test_app.app(), &uri).await;

    let (status, json) = common::submit(&test_app, &session_id, "a@example.com", "Dinner?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["recorded"], "duplicate");
    assert_eq!(json["progress"]["state"], "waiting");
    assert_eq!(json["progress"]["pending"], serde_json::json!(["b@example.com"]));
    let (_, after) = common::get_json(test_app.app(), &uri).await;
    assert_eq!(after["version"], before["version"]);
}

#[tokio::test]
async fn test_stale_turn_returns_409() {
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;
    common::submit(&test_app, &session_id, "b@example.com", "Hi").await;

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("/api/v1/sessions/{session_id}/submissions"),
        &serde_json::json!({
            "player_email": "a@example.com",
            "turn_number": 1,
            "content": "too late",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "stale_turn");
}

#[tokio::test]
async fn test_quit_abandons_session() {
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;
    let uri = format!("/api/v1/sessions/{session_id}/submissions");

    let (status, json) = common::post_json(
        test_app.app(),
        &uri,
        &serde_json::json!({ "player_email": "a@example.com", "kind": "quit" }),
    )
    .await;
    let (late_status, late) =
        common::submit(&test_app, &session_id, "a@example.com", "wait").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["recorded"].is_null());
    assert_eq!(json["progress"]["state"], "closed");
    assert_eq!(json["progress"]["status"], "abandoned");
    assert_eq!(late_status, StatusCode::CONFLICT);
    assert_eq!(late["error"], "invalid_transition");
    let (player, notice) = test_app.notifier.failure_notices().pop().unwrap();
    assert_eq!(player.as_str(), "a@example.com");
    assert_eq!(notice, late["message"]);
}

#[tokio::test]
async fn test_complete_active_session_returns_completed_view() {
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "dungeon", "a@example.com").await;

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("/api/v1/sessions/{session_id}/complete"),
        &serde_json::json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");
}

#[tokio::test]
async fn test_complete_waiting_session_returns_409() {
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("/api/v1/sessions/{session_id}/complete"),
        &serde_json::json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_transition");
}

#[tokio::test]
async fn test_get_unknown_session_returns_404_without_echoing_the_id() {
    let test_app = common::build_test_app();

    let (status, json) =
        common::get_json(test_app.app(), "/api/v1/sessions/K7mPq2Rs9TzX").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "session_not_found");
    assert_eq!(json["message"], "the session could not be found");
}

#[tokio::test]
async fn test_malformed_session_id_returns_400() {
    let test_app = common::build_test_app();

    let (status, json) =
        common::get_json(test_app.app(), "/api/v1/sessions/not%20an%20id").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_session_events_list_the_journal_in_order() {
    // Arrange
    let test_app = common::build_test_app();
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;
    common::submit(&test_app, &session_id, "b@example.com", "Hi, I'm in").await;

    // Act
    let (status, json) = common::get_json(
        test_app.app(),
        &format!("/api/v1/sessions/{session_id}/events"),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let events = json.as_array().unwrap();
    assert_eq!(events[0]["event_type"], "session.started");
    assert_eq!(events[0]["sequence_number"], 1);
    let sequence: Vec<i64> = events
        .iter()
        .map(|e| e["sequence_number"].as_i64().unwrap())
        .collect();
    let expected: Vec<i64> = (1..=i64::try_from(events.len()).unwrap()).collect();
    assert_eq!(sequence, expected);
    assert!(events.iter().any(|e| e["event_type"] == "session.turn_completed"));
    assert!(!json.to_string().contains("Hi, I'm in"));
}

#[tokio::test]
async fn test_events_of_unknown_session_return_404() {
    let test_app = common::build_test_app();

    let (status, json) =
        common::get_json(test_app.app(), "/api/v1/sessions/K7mPq2Rs9TzX/events").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "session_not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_session_round_trip_through_postgres(pool: PgPool) {
    // Arrange
    let test_app = common::build_test_app_with_pool(pool);
    let session_id = common::start_session(&test_app, "intimacy", "a@example.com").await;

    // Act
    common::submit(&test_app, &session_id, "b@example.com", "Hi").await;
    let (status, view) =
        common::get_json(test_app.app(), &format!("/api/v1/sessions/{session_id}")).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["session_id"], session_id);
    assert_eq!(view["status"], "active");
    assert_eq!(view["current_turn"]["turn_number"], 2);
    let (status, events) =
        common::get_json(test_app.app(), &format!("/api/v1/sessions/{session_id}/events")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events[0]["event_type"], "session.started");
}
