//! Server configuration read from the environment at startup.

use turnpost_coordinator::RetryPolicy;
use turnpost_session::domain::timeouts::{GameProfile, TimeoutConfig};

use crate::error::AppError;

const HOUR: i64 = 60 * 60;
const MINUTE: i64 = 60;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// PostgreSQL URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
    /// OTLP collector endpoint; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
    /// Timeout policy shared by every game profile.
    pub timeouts: TimeoutConfig,
    /// Attempts per inbound submission, the first one included.
    pub dispatch_max_attempts: u32,
}

impl AppConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for a malformed value or an inconsistent
    /// timeout policy.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns the raw value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for a malformed value or an inconsistent
    /// timeout policy.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = TimeoutConfig::default();
        let timeouts = TimeoutConfig {
            turn_timeout_secs: scaled(&lookup, "TURNPOST_TURN_TIMEOUT_HOURS", HOUR)?
                .unwrap_or(defaults.turn_timeout_secs),
            reminder_grace_secs: scaled(&lookup, "TURNPOST_REMINDER_GRACE_MINUTES", MINUTE)?
                .unwrap_or(defaults.reminder_grace_secs),
            missed_turn_grace_secs: scaled(&lookup, "TURNPOST_MISSED_GRACE_MINUTES", MINUTE)?
                .unwrap_or(defaults.missed_turn_grace_secs),
            join_timeout_secs: scaled(&lookup, "TURNPOST_JOIN_TIMEOUT_HOURS", HOUR)?
                .unwrap_or(defaults.join_timeout_secs),
            processing_lease_secs: scaled(&lookup, "TURNPOST_PROCESSING_LEASE_MINUTES", MINUTE)?
                .unwrap_or(defaults.processing_lease_secs),
            max_consecutive_misses: parsed(&lookup, "TURNPOST_MAX_CONSECUTIVE_MISSES")?
                .unwrap_or(defaults.max_consecutive_misses),
        };
        timeouts
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let dispatch_max_attempts = parsed(&lookup, "TURNPOST_DISPATCH_MAX_ATTEMPTS")?
            .unwrap_or(RetryPolicy::default().max_attempts);
        if dispatch_max_attempts == 0 {
            return Err(AppError::Config(
                "TURNPOST_DISPATCH_MAX_ATTEMPTS must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parsed(&lookup, "PORT")?.unwrap_or(3000),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|url| !url.is_empty()),
            timeouts,
            dispatch_max_attempts,
        })
    }

    /// The game profiles this server can start.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a profile is inconsistent.
    pub fn profiles(&self) -> Result<Vec<GameProfile>, AppError> {
        let profiles = vec![
            GameProfile::dungeon(self.timeouts),
            GameProfile::intimacy(self.timeouts),
        ];
        for profile in &profiles {
            profile
                .validate()
                .map_err(|e| AppError::Config(format!("{}: {e}", profile.game_type)))?;
        }
        Ok(profiles)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.dispatch_max_attempts,
            ..RetryPolicy::default()
        }
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        })
        .transpose()
}

fn scaled(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    unit_secs: i64,
) -> Result<Option<i64>, AppError> {
    parsed::<i64>(lookup, key)?
        .map(|n| {
            n.checked_mul(unit_secs)
                .ok_or_else(|| AppError::Config(format!("{key} is out of range")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.dispatch_max_attempts, 4);
    }

    #[test]
    fn test_timeouts_are_read_in_their_units() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TURNPOST_TURN_TIMEOUT_HOURS", "12"),
            ("TURNPOST_REMINDER_GRACE_MINUTES", "30"),
            ("TURNPOST_MISSED_GRACE_MINUTES", "90"),
            ("TURNPOST_MAX_CONSECUTIVE_MISSES", "3"),
        ]))
        .unwrap();

        assert_eq!(config.timeouts.turn_timeout_secs, 12 * HOUR);
        assert_eq!(config.timeouts.reminder_grace_secs, 30 * MINUTE);
        assert_eq!(config.timeouts.missed_turn_grace_secs, 90 * MINUTE);
        assert_eq!(config.timeouts.max_consecutive_misses, 3);
    }

    #[test]
    fn test_malformed_port_is_a_config_error() {
        let result = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")]));

        match result.unwrap_err() {
            AppError::Config(message) => assert!(message.contains("PORT")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_missed_grace_shorter_than_reminder_grace_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("TURNPOST_REMINDER_GRACE_MINUTES", "60"),
            ("TURNPOST_MISSED_GRACE_MINUTES", "30"),
        ]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_profiles_share_timeouts_except_intimacy_turns() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        let profiles = config.profiles().unwrap();

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].game_type.as_str(), "dungeon");
        assert_eq!(profiles[1].timeouts.turn_timeout_secs, 72 * HOUR);
        assert_eq!(
            profiles[1].timeouts.reminder_grace_secs,
            config.timeouts.reminder_grace_secs
        );
    }
}
