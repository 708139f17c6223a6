//! Session store database schema.

/// SQL to create the sessions table. Mirrors `migrations/0001_create_sessions.sql`.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    session_id    VARCHAR(64) PRIMARY KEY,
    version       BIGINT NOT NULL CHECK (version > 0),
    status        VARCHAR(32) NOT NULL,
    next_deadline TIMESTAMPTZ,
    payload       JSONB NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_sessions_next_deadline
    ON sessions (next_deadline)
    WHERE next_deadline IS NOT NULL;
";

/// SQL to create the session journal. Mirrors
/// `migrations/0002_create_session_events.sql`.
pub const CREATE_SESSION_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS session_events (
    event_id        UUID PRIMARY KEY,
    session_id      VARCHAR(64) NOT NULL REFERENCES sessions (session_id),
    event_type      VARCHAR(255) NOT NULL,
    payload         JSONB NOT NULL,
    sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
    correlation_id  UUID NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (session_id, sequence_number)
);

CREATE INDEX IF NOT EXISTS idx_session_events_correlation_id
    ON session_events (correlation_id);
";
