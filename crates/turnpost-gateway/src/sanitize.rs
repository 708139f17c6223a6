//! Result sanitization for model-bound tool output.

use serde_json::{Map, Value};
use turnpost_core::identity::SessionId;

use crate::schema::is_internal_identifier;

const REDACTED: &str = "[redacted]";

/// Removes internal identifier keys at every depth and replaces literal
/// occurrences of the bound session id inside strings.
#[must_use]
pub fn sanitize(value: Value, session_id: &SessionId) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_internal_identifier(key))
                .map(|(key, value)| (key, sanitize(value, session_id)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize(item, session_id))
                .collect(),
        ),
        Value::String(text) if text.contains(session_id.as_str()) => {
            Value::String(text.replace(session_id.as_str(), REDACTED))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_sanitize_strips_keys_and_literal_ids() {
        // Arrange
        let session_id = SessionId::parse("K7mPq2Rs9TzX").unwrap();
        let raw = json!({
            "status": "active",
            "session_id": "K7mPq2Rs9TzX",
            "version": 4,
            "turns": [
                {"turnId": "t-1", "narrative": "Reply to game-K7mPq2Rs9TzX@example.com"}
            ]
        });

        // Act
        let clean = sanitize(raw, &session_id);

        // Assert
        assert_eq!(
            clean,
            json!({
                "status": "active",
                "turns": [{"narrative": "Reply to game-[redacted]@example.com"}]
            })
        );
    }

    #[test]
    fn test_sanitize_leaves_unrelated_values_alone() {
        let session_id = SessionId::parse("K7mPq2Rs9TzX").unwrap();
        let raw = json!({"limit": 5, "ok": true, "players": ["a@example.com"]});

        assert_eq!(sanitize(raw.clone(), &session_id), raw);
    }
}
