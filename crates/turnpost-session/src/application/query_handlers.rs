//! Query handlers for the session context.
//!
//! Queries load the stored snapshot or journal and return read-only view
//! DTOs. Views carry no contribution content.

use chrono::{DateTime, Utc};
use serde::Serialize;
use turnpost_core::aggregate::AggregateRoot;
use turnpost_core::error::DomainError;
use turnpost_core::identity::{PlayerEmail, SessionId};
use turnpost_core::repository::{SessionRepository, StoredEvent};
use uuid::Uuid;

use crate::application::store::SessionStore;
use crate::domain::aggregates::Session;
use crate::domain::lifecycle::SessionStatus;
use crate::domain::player::PlayerRole;
use crate::domain::turn::{Turn, TurnStatus};

/// Read-only view of one player.
#[derive(Debug, Serialize)]
pub struct PlayerView {
    /// Player email.
    pub email: PlayerEmail,
    /// How the player joined.
    pub role: PlayerRole,
    /// Turns missed in a row.
    pub consecutive_misses: u32,
}

/// Read-only view of the current turn.
#[derive(Debug, Serialize)]
pub struct TurnView {
    /// Turn number.
    pub turn_number: u32,
    /// Turn status.
    pub status: TurnStatus,
    /// Response deadline.
    pub deadline: DateTime<Utc>,
    /// Players who submitted.
    pub responded: Vec<PlayerEmail>,
    /// Required players without a response.
    pub pending: Vec<PlayerEmail>,
    /// Whether the turn was claimed by the timeout sweep.
    pub forced: bool,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            turn_number: turn.number,
            status: turn.status,
            deadline: turn.deadline,
            responded: turn.contributions().map(|(email, _)| email.clone()).collect(),
            pending: turn.pending().into_iter().cloned().collect(),
            forced: turn.forced,
        }
    }
}

/// Read-only view of a session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// Session identifier.
    pub session_id: SessionId,
    /// Game type.
    pub game_type: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Players in join order.
    pub players: Vec<PlayerView>,
    /// Players needed to activate.
    pub min_players: u32,
    /// Player capacity.
    pub max_players: u32,
    /// The current turn, once the session has activated.
    pub current_turn: Option<TurnView>,
    /// Next instant the timeout sweep has work.
    pub next_deadline: Option<DateTime<Utc>>,
    /// Stored version.
    pub version: i64,
    /// Timestamp of the last change.
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            game_type: session.game_type.to_string(),
            status: session.status,
            players: session
                .players
                .iter()
                .map(|p| PlayerView {
                    email: p.email.clone(),
                    role: p.role,
                    consecutive_misses: p.consecutive_misses,
                })
                .collect(),
            min_players: session.min_players,
            max_players: session.max_players,
            current_turn: session.current_turn().map(TurnView::from),
            next_deadline: session.next_deadline(),
            version: session.version(),
            updated_at: session.updated_at,
        }
    }
}

/// Retrieves a session by id.
///
/// # Errors
///
/// Returns `DomainError::SessionNotFound` if no session exists.
/// Returns `DomainError::Infrastructure` if the snapshot does not decode.
pub async fn get_session_by_id(
    session_id: &SessionId,
    repo: &dyn SessionRepository,
) -> Result<SessionView, DomainError> {
    let session = SessionStore::new(repo).get_session(session_id).await?;
    Ok(SessionView::from(&session))
}

/// Read-only view of one journal entry.
#[derive(Debug, Serialize)]
pub struct EventView {
    /// Position in the journal, starting at 1.
    pub sequence_number: i64,
    pub event_id: Uuid,
    /// Variant name, e.g. `TurnResolved`.
    pub event_type: String,
    /// Correlation ID of the request or sweep that produced it.
    pub correlation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl From<StoredEvent> for EventView {
    fn from(event: StoredEvent) -> Self {
        Self {
            sequence_number: event.sequence_number,
            event_id: event.event_id,
            event_type: event.event_type,
            correlation_id: event.correlation_id,
            occurred_at: event.occurred_at,
            payload: event.payload,
        }
    }
}

/// Retrieves a session's journal, oldest entry first.
///
/// # Errors
///
/// Returns `DomainError::SessionNotFound` if no session exists.
/// Returns `DomainError::Infrastructure` if the journal cannot be read.
pub async fn get_session_events(
    session_id: &SessionId,
    repo: &dyn SessionRepository,
) -> Result<Vec<EventView>, DomainError> {
    let store = SessionStore::new(repo);
    store.get_session(session_id).await?;
    let events = store.get_events(session_id).await?;
    Ok(events.into_iter().map(EventView::from).collect())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use turnpost_core::error::DomainError;
    use turnpost_core::identity::{GameType, PlayerEmail, SessionId};
    use uuid::Uuid;

    use crate::application::command_handlers::handle_start_session;
    use crate::application::query_handlers::{get_session_by_id, get_session_events};
    use crate::domain::commands::StartSession;
    use crate::domain::lifecycle::SessionStatus;
    use crate::domain::timeouts::{GameProfile, TimeoutConfig};
    use crate::domain::turn::TurnStatus;
    use turnpost_test_support::{FailingSessionRepository, FixedClock, MockRng, RecordingSessionRepository};

    #[tokio::test]
    async fn test_get_session_by_id_returns_view() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let repo = RecordingSessionRepository::new();
        let command = StartSession {
            correlation_id: Uuid::new_v4(),
            game_type: GameType::parse("dungeon").unwrap(),
            initiator: PlayerEmail::parse("a@example.com").unwrap(),
            content: "I enter the crypt".to_owned(),
            attachments: Vec::new(),
        };
        let started = handle_start_session(
            &command,
            &GameProfile::dungeon(TimeoutConfig::default()),
            &clock,
            &mut MockRng,
            &repo,
        )
        .await
        .unwrap();

        // Act
        let view = get_session_by_id(started.session_id(), &repo).await.unwrap();

        // Assert
        assert_eq!(view.session_id.as_str(), "222222222222");
        assert_eq!(view.game_type, "dungeon");
        assert_eq!(view.status, SessionStatus::Active);
        assert_eq!(view.players.len(), 1);
        assert_eq!(view.version, 1);
        let turn = view.current_turn.unwrap();
        assert_eq!(turn.turn_number, 1);
        assert_eq!(turn.status, TurnStatus::Processing);
        assert_eq!(turn.responded.len(), 1);
        assert!(turn.pending.is_empty());
    }

    #[tokio::test]
    async fn test_get_session_by_id_view_serializes_without_content() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let repo = RecordingSessionRepository::new();
        let command = StartSession {
            correlation_id: Uuid::new_v4(),
            game_type: GameType::parse("dungeon").unwrap(),
            initiator: PlayerEmail::parse("a@example.com").unwrap(),
            content: "a secret plan".to_owned(),
            attachments: Vec::new(),
        };
        let started = handle_start_session(
            &command,
            &GameProfile::dungeon(TimeoutConfig::default()),
            &clock,
            &mut MockRng,
            &repo,
        )
        .await
        .unwrap();

        let view = get_session_by_id(started.session_id(), &repo).await.unwrap();
        let json = serde_json::to_string(&view).unwrap();

        assert!(!json.contains("a secret plan"));
        assert!(json.contains("\"status\":\"active\""));
    }

    #[tokio::test]
    async fn test_get_session_by_id_returns_not_found() {
        let repo = RecordingSessionRepository::new();
        let missing = SessionId::parse("missing").unwrap();

        let result = get_session_by_id(&missing, &repo).await;

        match result.unwrap_err() {
            DomainError::SessionNotFound(id) => assert_eq!(id, missing),
            other => panic!("expected SessionNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_session_by_id_propagates_infrastructure_error() {
        let result = get_session_by_id(&SessionId::parse("abc").unwrap(), &FailingSessionRepository).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_get_session_events_lists_journal_in_order() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let repo = RecordingSessionRepository::new();
        let command = StartSession {
            correlation_id: Uuid::new_v4(),
            game_type: GameType::parse("dungeon").unwrap(),
            initiator: PlayerEmail::parse("a@example.com").unwrap(),
            content: "a secret plan".to_owned(),
            attachments: Vec::new(),
        };
        let started = handle_start_session(
            &command,
            &GameProfile::dungeon(TimeoutConfig::default()),
            &clock,
            &mut MockRng,
            &repo,
        )
        .await
        .unwrap();

        // Act
        let events = get_session_events(started.session_id(), &repo).await.unwrap();

        // Assert
        assert_eq!(events[0].event_type, "session.started");
        assert_eq!(events[0].sequence_number, 1);
        assert!(events.windows(2).all(|w| w[0].sequence_number + 1 == w[1].sequence_number));
        assert!(events.iter().all(|e| e.correlation_id == command.correlation_id));
        assert!(events.iter().any(|e| e.event_type == "session.turn_processing_started"));
        let json = serde_json::to_string(&events).unwrap();
        assert!(!json.contains("a secret plan"));
    }

    #[tokio::test]
    async fn test_get_session_events_returns_not_found() {
        let repo = RecordingSessionRepository::new();
        let missing = SessionId::parse("missing").unwrap();

        let result = get_session_events(&missing, &repo).await;

        assert!(matches!(result, Err(DomainError::SessionNotFound(_))));
    }
}
