//! `PostgreSQL` implementation of the `SessionRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use turnpost_core::error::DomainError;
use turnpost_core::identity::SessionId;
use turnpost_core::repository::{SessionRepository, StoredEvent, StoredSession};

use crate::schema::{CREATE_SESSION_EVENTS_TABLE, CREATE_SESSIONS_TABLE};

/// PostgreSQL-backed session repository.
#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Creates a new `PgSessionRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the sessions and journal tables and their indexes if they do
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        for statement in [CREATE_SESSIONS_TABLE, CREATE_SESSION_EVENTS_TABLE] {
            sqlx::raw_sql(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::Infrastructure(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn current_version(&self, session_id: &SessionId) -> Result<Option<i64>, DomainError> {
        let row = sqlx::query("SELECT version FROM sessions WHERE session_id = $1")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| r.try_get::<i64, _>("version").map_err(backend))
            .transpose()
    }

    async fn conflict(&self, session_id: &SessionId, expected: i64) -> DomainError {
        match self.current_version(session_id).await {
            Ok(Some(actual)) => DomainError::ConcurrencyConflict {
                session_id: session_id.clone(),
                expected,
                actual,
            },
            Ok(None) => DomainError::SessionNotFound(session_id.clone()),
            Err(e) => e,
        }
    }
}

fn backend(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(e.to_string())
}

fn row_to_stored(row: &PgRow) -> Result<StoredSession, DomainError> {
    let raw_id: String = row.try_get("session_id").map_err(backend)?;
    Ok(StoredSession {
        session_id: SessionId::parse(&raw_id)
            .map_err(|e| DomainError::Infrastructure(format!("corrupt session id: {e}")))?,
        version: row.try_get("version").map_err(backend)?,
        status: row.try_get("status").map_err(backend)?,
        next_deadline: row.try_get("next_deadline").map_err(backend)?,
        payload: row.try_get("payload").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

fn row_to_event(row: &PgRow) -> Result<StoredEvent, DomainError> {
    let raw_id: String = row.try_get("session_id").map_err(backend)?;
    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(backend)?,
        session_id: SessionId::parse(&raw_id)
            .map_err(|e| DomainError::Infrastructure(format!("corrupt session id: {e}")))?,
        event_type: row.try_get("event_type").map_err(backend)?,
        payload: row.try_get("payload").map_err(backend)?,
        sequence_number: row.try_get("sequence_number").map_err(backend)?,
        correlation_id: row.try_get("correlation_id").map_err(backend)?,
        occurred_at: row.try_get("occurred_at").map_err(backend)?,
    })
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<StoredSession>, DomainError> {
        let row = sqlx::query(
            r"
            SELECT session_id, version, status, next_deadline, payload, updated_at
              FROM sessions
             WHERE session_id = $1
            ",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(row_to_stored).transpose()
    }

    async fn save_session(
        &self,
        session: StoredSession,
        events: &[StoredEvent],
        expected_version: i64,
    ) -> Result<(), DomainError> {
        if session.version != expected_version + 1 {
            return Err(DomainError::Infrastructure(format!(
                "version must advance by one: expected {}, got {}",
                expected_version + 1,
                session.version
            )));
        }

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let result = if expected_version == 0 {
            sqlx::query(
                r"
                INSERT INTO sessions
                    (session_id, version, status, next_deadline, payload, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (session_id) DO NOTHING
                ",
            )
            .bind(session.session_id.as_str())
            .bind(session.version)
            .bind(&session.status)
            .bind(session.next_deadline)
            .bind(&session.payload)
            .bind(session.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
        } else {
            sqlx::query(
                r"
                UPDATE sessions
                   SET version = $2,
                       status = $3,
                       next_deadline = $4,
                       payload = $5,
                       updated_at = $6
                 WHERE session_id = $1
                   AND version = $7
                ",
            )
            .bind(session.session_id.as_str())
            .bind(session.version)
            .bind(&session.status)
            .bind(session.next_deadline)
            .bind(&session.payload)
            .bind(session.updated_at)
            .bind(expected_version)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
        };

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Err(self.conflict(&session.session_id, expected_version).await);
        }

        for event in events {
            sqlx::query(
                r"
                INSERT INTO session_events
                    (event_id, session_id, event_type, payload, sequence_number,
                     correlation_id, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(event.event_id)
            .bind(event.session_id.as_str())
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.sequence_number)
            .bind(event.correlation_id)
            .bind(event.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        debug!(
            session_id = %session.session_id,
            version = session.version,
            status = %session.status,
            events = events.len(),
            "session saved"
        );
        Ok(())
    }

    async fn load_events(&self, session_id: &SessionId) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query(
            r"
            SELECT event_id, session_id, event_type, payload, sequence_number,
                   correlation_id, occurred_at
              FROM session_events
             WHERE session_id = $1
             ORDER BY sequence_number
            ",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_event).collect()
    }

    async fn list_due_sessions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, DomainError> {
        let limit = i64::try_from(limit)
            .map_err(|_| DomainError::Validation("limit too large".to_owned()))?;
        let rows = sqlx::query(
            r"
            SELECT session_id
              FROM sessions
             WHERE next_deadline IS NOT NULL
               AND next_deadline <= $1
             ORDER BY next_deadline
             LIMIT $2
            ",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("session_id").map_err(backend)?;
                SessionId::parse(&raw)
                    .map_err(|e| DomainError::Infrastructure(format!("corrupt session id: {e}")))
            })
            .collect()
    }
}
