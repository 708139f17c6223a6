//! Shared application state.

use std::sync::{Arc, Mutex};

use turnpost_coordinator::{RetryPolicy, TurnCoordinator};
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::identity::GameType;
use turnpost_core::notifier::Notifier;
use turnpost_core::repository::SessionRepository;
use turnpost_core::rng::DeterministicRng;
use turnpost_gateway::{Narrator, ToolRegistry};
use turnpost_session::domain::timeouts::GameProfile;

use crate::narrator::RecapNarrator;
use crate::notifier::LogNotifier;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Versioned session storage.
    pub repository: Arc<dyn SessionRepository>,
    /// Clock for deterministic time.
    pub clock: Arc<dyn Clock>,
    /// RNG for session ids.
    pub rng: Arc<Mutex<dyn DeterministicRng>>,
    /// Model seam invoked for every claimed turn.
    pub narrator: Arc<dyn Narrator>,
    /// Outbound messages.
    pub notifier: Arc<dyn Notifier>,
    /// Tools the narrator may call, built once at startup.
    pub registry: Arc<ToolRegistry>,
    /// Game profiles, one per game type.
    pub profiles: Arc<Vec<GameProfile>>,
    /// Retries for inbound submissions.
    pub retry_policy: RetryPolicy,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("profiles", &self.profiles)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state with the built-in narrator and the log
    /// notifier.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng>>,
        registry: ToolRegistry,
        profiles: Vec<GameProfile>,
    ) -> Self {
        Self {
            repository,
            clock,
            rng,
            narrator: Arc::new(RecapNarrator),
            notifier: Arc::new(LogNotifier),
            registry: Arc::new(registry),
            profiles: Arc::new(profiles),
            retry_policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// A coordinator borrowing this state's collaborators.
    #[must_use]
    pub fn coordinator(&self) -> TurnCoordinator<'_> {
        TurnCoordinator::new(
            self.repository.as_ref(),
            self.narrator.as_ref(),
            self.notifier.as_ref(),
            &self.registry,
            self.clock.as_ref(),
        )
    }

    /// The profile for a game type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a game type with no profile.
    pub fn profile(&self, game_type: &GameType) -> Result<&GameProfile, DomainError> {
        self.profiles
            .iter()
            .find(|profile| &profile.game_type == game_type)
            .ok_or_else(|| DomainError::Validation(format!("unknown game type: {game_type}")))
    }
}
