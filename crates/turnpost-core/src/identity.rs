//! Identifiers shared across bounded contexts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::rng::DeterministicRng;

/// Alphabet for generated session ids: no `0/O` or `1/I/l` look-alikes, and
/// every character is valid in an email local part.
pub const SESSION_ID_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz";

/// Length of generated session ids.
pub const SESSION_ID_LENGTH: usize = 12;

const MAX_SESSION_ID_LENGTH: usize = 64;

/// Opaque session identifier. Resolved server-side from the inbound envelope
/// and never handed to the narrator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Parses a session id received from an envelope or URL path.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the id is empty, too long, or
    /// contains characters other than ASCII alphanumerics, `-` and `_`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_SESSION_ID_LENGTH {
            return Err(DomainError::Validation(
                "session id must be between 1 and 64 characters".to_owned(),
            ));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::Validation(
                "session id contains unsupported characters".to_owned(),
            ));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Generates a new human-safe session id.
    pub fn generate(rng: &mut dyn DeterministicRng) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let last = (SESSION_ID_ALPHABET.len() - 1) as u32;
        let id = (0..SESSION_ID_LENGTH)
            .map(|_| char::from(SESSION_ID_ALPHABET[rng.next_u32_range(0, last) as usize]))
            .collect();
        Self(id)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized player email address, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerEmail(String);

impl PlayerEmail {
    /// Normalizes (trim, lower-case) and validates an email address.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` unless the address has exactly one
    /// `@` with a non-empty local part and a dotted domain.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();
        let invalid = || DomainError::Validation(format!("invalid email address: {normalized}"));

        let (local, domain) = normalized.split_once('@').ok_or_else(invalid)?;
        if local.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || normalized.chars().any(char::is_whitespace)
        {
            return Err(invalid());
        }
        Ok(Self(normalized))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Game type, e.g. `dungeon` or `intimacy`. Selects the game profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameType(String);

impl GameType {
    /// Parses a game type name (lower-cased ASCII letters, digits, `-`, `_`).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for empty or malformed names.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty()
            || !normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::Validation(format!(
                "invalid game type: {normalized}"
            )));
        }
        Ok(Self(normalized))
    }

    /// Wraps a built-in game type name that is already normalized.
    #[must_use]
    pub fn from_static(name: &'static str) -> Self {
        debug_assert_eq!(name, name.to_lowercase());
        Self(name.to_owned())
    }

    /// Returns the game type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
