//! Turn state machine and per-turn response bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use turnpost_core::error::DomainError;
use turnpost_core::identity::PlayerEmail;

/// Status of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Collecting contributions.
    Waiting,
    /// Claimed for narration.
    Processing,
    /// Narration committed.
    Completed,
}

impl TurnStatus {
    /// The snake_case name used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

/// Inputs to the turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// Every required responder has submitted.
    AllResponded,
    /// The timeout policy forces processing with partial data.
    TimeoutForced,
    /// The narrator's output has been committed.
    NarrationCommitted,
}

impl TurnEvent {
    /// The snake_case name used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllResponded => "all_responded",
            Self::TimeoutForced => "timeout_forced",
            Self::NarrationCommitted => "narration_committed",
        }
    }
}

/// Computes the next turn status.
///
/// # Errors
///
/// Returns `DomainError::InvalidTransition` for any pair not in the table.
pub fn transition(state: TurnStatus, event: TurnEvent) -> Result<TurnStatus, DomainError> {
    match (state, event) {
        (TurnStatus::Waiting, TurnEvent::AllResponded | TurnEvent::TimeoutForced) => {
            Ok(TurnStatus::Processing)
        }
        (TurnStatus::Processing, TurnEvent::NarrationCommitted) => Ok(TurnStatus::Completed),
        _ => Err(DomainError::InvalidTransition {
            from: state.as_str(),
            event: event.as_str(),
        }),
    }
}

/// Metadata about an attachment carried by an inbound message. The bytes
/// themselves stay with the mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    /// File name as sent.
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// A player's contribution to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Message body.
    pub content: String,
    /// When the contribution was accepted.
    pub submitted_at: DateTime<Utc>,
    /// Attachment metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentMeta>,
}

impl Contribution {
    /// Whether `other` carries the same payload, ignoring arrival time.
    #[must_use]
    pub fn same_payload(&self, other: &Self) -> bool {
        self.content == other.content && self.attachments == other.attachments
    }
}

/// Response state of one player for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Response {
    /// The player contributed.
    Submitted(Contribution),
    /// The player let the deadline and grace period pass.
    Missed {
        /// When the miss was recorded.
        marked_at: DateTime<Utc>,
    },
}

/// What happened to a contribution handed to [`Turn::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First response from this player for the turn.
    Recorded,
    /// Replaced an earlier, different contribution.
    Overwritten,
    /// Identical to what is stored. Nothing changed.
    Duplicate,
}

/// One round of contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Sequential from 1.
    pub number: u32,
    /// Current status.
    pub status: TurnStatus,
    /// When the turn opened.
    pub opened_at: DateTime<Utc>,
    /// `opened_at + turn_timeout`.
    pub deadline: DateTime<Utc>,
    /// Players whose response the turn waits for, fixed when the turn opens.
    pub required: BTreeSet<PlayerEmail>,
    /// Responses keyed by player; the key is the idempotency key within the turn.
    pub responses: BTreeMap<PlayerEmail, Response>,
    /// Players already reminded for this turn.
    #[serde(default)]
    pub reminded: BTreeSet<PlayerEmail>,
    /// Claim timestamp, set when the turn moves to processing.
    pub processing_started_at: Option<DateTime<Utc>>,
    /// Whether processing was forced by the timeout policy.
    #[serde(default)]
    pub forced: bool,
    /// Narrator output.
    pub narrative: Option<String>,
    /// When narration was committed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Turn {
    /// Opens a turn waiting on `required`.
    #[must_use]
    pub fn open(
        number: u32,
        required: BTreeSet<PlayerEmail>,
        opened_at: DateTime<Utc>,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            number,
            status: TurnStatus::Waiting,
            opened_at,
            deadline: opened_at + turn_timeout,
            required,
            responses: BTreeMap::new(),
            reminded: BTreeSet::new(),
            processing_started_at: None,
            forced: false,
            narrative: None,
            completed_at: None,
        }
    }

    /// Stores a contribution under the player's key.
    ///
    /// A late contribution replaces a `Missed` marker while the turn is still
    /// waiting.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TurnClosed` if the turn is no longer waiting and
    /// the contribution differs from the stored one.
    pub fn record(
        &mut self,
        player: &PlayerEmail,
        contribution: Contribution,
    ) -> Result<RecordOutcome, DomainError> {
        let existing = self.responses.get(player);
        if let Some(Response::Submitted(stored)) = existing
            && stored.same_payload(&contribution)
        {
            return Ok(RecordOutcome::Duplicate);
        }
        if self.status != TurnStatus::Waiting {
            return Err(DomainError::TurnClosed(self.number));
        }

        let outcome = match existing {
            Some(Response::Submitted(_)) => RecordOutcome::Overwritten,
            Some(Response::Missed { .. }) | None => RecordOutcome::Recorded,
        };
        self.responses
            .insert(player.clone(), Response::Submitted(contribution));
        Ok(outcome)
    }

    /// The stored contribution of a player, if any.
    #[must_use]
    pub fn contribution_of(&self, player: &PlayerEmail) -> Option<&Contribution> {
        match self.responses.get(player) {
            Some(Response::Submitted(contribution)) => Some(contribution),
            _ => None,
        }
    }

    /// Submitted contributions in player order.
    pub fn contributions(&self) -> impl Iterator<Item = (&PlayerEmail, &Contribution)> {
        self.responses.iter().filter_map(|(player, response)| match response {
            Response::Submitted(contribution) => Some((player, contribution)),
            Response::Missed { .. } => None,
        })
    }

    /// Required responders with no response of any kind.
    #[must_use]
    pub fn pending(&self) -> Vec<&PlayerEmail> {
        self.required
            .iter()
            .filter(|player| !self.responses.contains_key(*player))
            .collect()
    }

    /// Whether every required responder has submitted.
    #[must_use]
    pub fn all_responded(&self) -> bool {
        !self.required.is_empty()
            && self
                .required
                .iter()
                .all(|player| self.contribution_of(player).is_some())
    }

    /// Claims the turn for narration.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the turn is waiting.
    pub fn begin_processing(
        &mut self,
        event: TurnEvent,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.status = transition(self.status, event)?;
        self.processing_started_at = Some(now);
        self.forced = event == TurnEvent::TimeoutForced;
        Ok(())
    }

    /// Renews the claim of a turn whose processing lease ran out.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the turn is processing.
    pub fn reclaim(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != TurnStatus::Processing {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                event: "reclaim",
            });
        }
        self.processing_started_at = Some(now);
        Ok(())
    }

    /// Commits narrator output and closes the turn.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the turn is processing.
    pub fn complete(&mut self, narrative: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.status = transition(self.status, TurnEvent::NarrationCommitted)?;
        self.narrative = Some(narrative);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Marks a silent required responder as missed. Returns `false` when
    /// nothing changed.
    pub fn mark_missed(&mut self, player: &PlayerEmail, now: DateTime<Utc>) -> bool {
        if self.status != TurnStatus::Waiting
            || !self.required.contains(player)
            || self.responses.contains_key(player)
        {
            return false;
        }
        self.responses
            .insert(player.clone(), Response::Missed { marked_at: now });
        true
    }

    /// Records that a reminder went out. Returns `false` when the player was
    /// already reminded or the turn is no longer waiting.
    pub fn mark_reminded(&mut self, player: &PlayerEmail) -> bool {
        if self.status != TurnStatus::Waiting {
            return false;
        }
        self.reminded.insert(player.clone())
    }
}
