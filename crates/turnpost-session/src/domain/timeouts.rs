//! Timeout configuration and per game type profiles.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use turnpost_core::error::DomainError;
use turnpost_core::identity::GameType;

const HOUR: i64 = 60 * 60;
const MINUTE: i64 = 60;

/// Upper bound on `max_players` for any profile.
pub const PLAYER_LIMIT: u32 = 20;

/// Elapsed-time policy of a session. Stored with the session so that a
/// configuration change never rewrites the deadlines of running games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Seconds from a turn opening to its deadline.
    pub turn_timeout_secs: i64,
    /// Seconds after the deadline during which a reminder may be sent.
    pub reminder_grace_secs: i64,
    /// Seconds after the deadline at which a silent player is marked missed.
    pub missed_turn_grace_secs: i64,
    /// Seconds an onboarding session may wait for quorum.
    pub join_timeout_secs: i64,
    /// Seconds a processing claim is honored before the sweep reclaims it.
    pub processing_lease_secs: i64,
    /// A player missing more turns in a row than this abandons the session.
    pub max_consecutive_misses: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: 24 * HOUR,
            reminder_grace_secs: HOUR,
            missed_turn_grace_secs: HOUR,
            join_timeout_secs: 48 * HOUR,
            processing_lease_secs: 15 * MINUTE,
            max_consecutive_misses: 2,
        }
    }
}

impl TimeoutConfig {
    /// Turn timeout as a duration.
    #[must_use]
    pub fn turn_timeout(&self) -> Duration {
        Duration::seconds(self.turn_timeout_secs)
    }

    /// Reminder window after the deadline.
    #[must_use]
    pub fn reminder_grace(&self) -> Duration {
        Duration::seconds(self.reminder_grace_secs)
    }

    /// Grace after the deadline before a miss is recorded.
    #[must_use]
    pub fn missed_turn_grace(&self) -> Duration {
        Duration::seconds(self.missed_turn_grace_secs)
    }

    /// Join window for onboarding sessions.
    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        Duration::seconds(self.join_timeout_secs)
    }

    /// Processing lease.
    #[must_use]
    pub fn processing_lease(&self) -> Duration {
        Duration::seconds(self.processing_lease_secs)
    }

    /// Checks the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TimeoutPolicyViolation` for non-positive
    /// durations or a reminder window that outlasts the missed-turn grace.
    pub fn validate(&self) -> Result<(), DomainError> {
        let durations = [
            ("turn_timeout", self.turn_timeout_secs),
            ("reminder_grace", self.reminder_grace_secs),
            ("missed_turn_grace", self.missed_turn_grace_secs),
            ("join_timeout", self.join_timeout_secs),
            ("processing_lease", self.processing_lease_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs <= 0) {
            return Err(DomainError::TimeoutPolicyViolation(format!(
                "{name} must be positive"
            )));
        }
        if self.reminder_grace_secs > self.missed_turn_grace_secs {
            return Err(DomainError::TimeoutPolicyViolation(
                "reminder_grace must not exceed missed_turn_grace".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Rules a game type imposes on its sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    /// The game type.
    pub game_type: GameType,
    /// Players needed to activate.
    pub min_players: u32,
    /// Player capacity.
    pub max_players: u32,
    /// Elapsed-time policy.
    pub timeouts: TimeoutConfig,
}

impl GameProfile {
    /// Fantasy adventure: one to four players, a day per turn.
    #[must_use]
    pub fn dungeon(timeouts: TimeoutConfig) -> Self {
        Self {
            game_type: GameType::from_static("dungeon"),
            min_players: 1,
            max_players: 4,
            timeouts,
        }
    }

    /// Couples conversation: exactly two players, three days per turn.
    #[must_use]
    pub fn intimacy(timeouts: TimeoutConfig) -> Self {
        Self {
            game_type: GameType::from_static("intimacy"),
            min_players: 2,
            max_players: 2,
            timeouts: TimeoutConfig {
                turn_timeout_secs: 72 * HOUR,
                ..timeouts
            },
        }
    }

    /// Checks player bounds and timeouts.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for bad player bounds and
    /// `DomainError::TimeoutPolicyViolation` for bad timeouts.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.min_players == 0
            || self.min_players > self.max_players
            || self.max_players > PLAYER_LIMIT
        {
            return Err(DomainError::Validation(format!(
                "{}: player bounds {}..={} are invalid",
                self.game_type, self.min_players, self.max_players
            )));
        }
        self.timeouts.validate()
    }
}
