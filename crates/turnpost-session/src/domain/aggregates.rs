//! The session aggregate.
//!
//! A session is persisted as one versioned snapshot. Command methods mutate
//! the in-memory copy and emit events; nothing is durable until the store
//! commits the snapshot against the version it was loaded at.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turnpost_core::aggregate::AggregateRoot;
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::event::EventMetadata;
use turnpost_core::identity::{GameType, PlayerEmail, SessionId};
use turnpost_core::repository::StoredSession;
use uuid::Uuid;

use super::events::{
    ContributionRecorded, LobbyContributionRecorded, NarratorNoteRecorded, PlayerJoined,
    ReminderMarked, ResponseMissed, SessionEvent, SessionEventKind, SessionStarted,
    StatusChanged, TurnCompleted, TurnOpened, TurnProcessingStarted, TurnReclaimed,
};
use super::lifecycle::{self, LifecycleEvent, SessionStatus};
use super::player::{Player, PlayerRole};
use super::timeouts::{GameProfile, TimeoutConfig};
use super::turn::{Contribution, RecordOutcome, Turn, TurnEvent, TurnStatus};

/// A state note recorded by the narrator through `update_game_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarratorNote {
    /// Turn the note was recorded during.
    pub turn_number: u32,
    /// Free-form state description.
    pub state_update: String,
    /// Why the narrator made the change.
    pub reason: String,
    /// When the note was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Where a session stands after a membership or submission change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Still onboarding; this many more players are needed.
    AwaitingPlayers {
        /// Players missing for quorum.
        needed: u32,
    },
    /// The current turn waits on these players.
    Waiting {
        /// The open turn.
        turn_number: u32,
        /// Required responders without a response.
        pending: Vec<PlayerEmail>,
    },
    /// The turn is claimed for narration by this commit.
    Claimed {
        /// The claimed turn.
        turn_number: u32,
    },
    /// The session is in a state that takes no more contributions.
    Closed(SessionStatus),
}

/// The aggregate root for one coordination session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Game type.
    pub game_type: GameType,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Players in join order. Append-only.
    pub players: Vec<Player>,
    /// Number of the newest turn, 0 before activation. Never decreases.
    pub current_turn_number: u32,
    /// Turn history, oldest first.
    pub turns: Vec<Turn>,
    /// Onboarding messages, seeded into turn 1 on activation.
    #[serde(default)]
    pub lobby: BTreeMap<PlayerEmail, Contribution>,
    /// Players needed to activate.
    pub min_players: u32,
    /// Player capacity.
    pub max_players: u32,
    /// Elapsed-time policy.
    pub timeouts: TimeoutConfig,
    /// Narrator state notes.
    #[serde(default)]
    pub notes: Vec<NarratorNote>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last change.
    pub updated_at: DateTime<Utc>,
    /// Events emitted so far, committed or not. The next event takes the
    /// following journal sequence number.
    #[serde(default)]
    pub events_recorded: i64,
    /// Version the snapshot was loaded at (0 when never stored).
    #[serde(skip)]
    version: i64,
    /// Uncommitted events pending persistence.
    #[serde(skip)]
    uncommitted_events: Vec<SessionEvent>,
}

impl Session {
    /// Creates a session for a first-contact message. The initiator is the
    /// first player and their message waits in the lobby.
    #[must_use]
    pub fn start(
        id: SessionId,
        profile: &GameProfile,
        initiator: PlayerEmail,
        opening: Contribution,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now();
        let mut session = Self {
            id,
            game_type: profile.game_type.clone(),
            status: SessionStatus::Initializing,
            players: vec![Player::new(initiator.clone(), PlayerRole::Initiator, now)],
            current_turn_number: 0,
            turns: Vec::new(),
            lobby: BTreeMap::from([(initiator.clone(), opening)]),
            min_players: profile.min_players,
            max_players: profile.max_players,
            timeouts: profile.timeouts,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
            events_recorded: 0,
            version: 0,
            uncommitted_events: Vec::new(),
        };
        session.emit(
            SessionEventKind::SessionStarted(SessionStarted {
                game_type: profile.game_type.clone(),
                initiator: initiator.clone(),
            }),
            correlation_id,
            now,
        );
        session.emit(
            SessionEventKind::PlayerJoined(PlayerJoined {
                player: initiator.clone(),
                role: PlayerRole::Initiator,
            }),
            correlation_id,
            now,
        );
        session.emit(
            SessionEventKind::LobbyContributionRecorded(LobbyContributionRecorded {
                player: initiator,
            }),
            correlation_id,
            now,
        );
        session
    }

    fn emit(&mut self, kind: SessionEventKind, correlation_id: Uuid, now: DateTime<Utc>) {
        self.events_recorded += 1;
        self.uncommitted_events.push(SessionEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                session_id: self.id.clone(),
                sequence_number: self.events_recorded,
                correlation_id,
                occurred_at: now,
            },
            kind,
        });
        self.updated_at = now;
    }

    fn change_status(
        &mut self,
        cause: LifecycleEvent,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let from = self.status;
        self.status = lifecycle::transition(from, cause)?;
        self.emit(
            SessionEventKind::StatusChanged(StatusChanged {
                from,
                to: self.status,
                cause,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Looks up a player.
    #[must_use]
    pub fn player(&self, email: &PlayerEmail) -> Option<&Player> {
        self.players.iter().find(|p| &p.email == email)
    }

    /// Whether the email belongs to a player of this session.
    #[must_use]
    pub fn is_player(&self, email: &PlayerEmail) -> bool {
        self.player(email).is_some()
    }

    /// Player emails in join order.
    #[must_use]
    pub fn player_emails(&self) -> Vec<PlayerEmail> {
        self.players.iter().map(|p| p.email.clone()).collect()
    }

    /// The newest turn, if the session has activated.
    #[must_use]
    pub fn current_turn(&self) -> Option<&Turn> {
        self.turn(self.current_turn_number)
    }

    /// A turn by number.
    #[must_use]
    pub fn turn(&self, number: u32) -> Option<&Turn> {
        self.turns.iter().find(|t| t.number == number)
    }

    fn current_turn_mut(&mut self) -> Option<&mut Turn> {
        let number = self.current_turn_number;
        self.turns.iter_mut().find(|t| t.number == number)
    }

    /// Adds a player during onboarding. Returns `false` if the player is
    /// already a member.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` once onboarding is over and
    /// `DomainError::SessionFull` at capacity.
    pub fn register_player(
        &mut self,
        email: PlayerEmail,
        role: PlayerRole,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, DomainError> {
        if !self.status.accepts_new_players() {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                event: "add_player",
            });
        }
        if self.is_player(&email) {
            return Ok(false);
        }
        if self.players.len() >= self.max_players as usize {
            return Err(DomainError::SessionFull {
                max_players: self.max_players,
            });
        }

        let now = clock.now();
        self.players.push(Player::new(email.clone(), role, now));
        self.emit(
            SessionEventKind::PlayerJoined(PlayerJoined { player: email, role }),
            correlation_id,
            now,
        );
        Ok(true)
    }

    /// Stores an onboarding message under the sender's key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` once onboarding is over and
    /// `DomainError::PlayerNotRecognized` for non-members.
    pub fn record_lobby_contribution(
        &mut self,
        email: &PlayerEmail,
        contribution: Contribution,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<RecordOutcome, DomainError> {
        if !self.status.accepts_new_players() {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                event: "submit_contribution",
            });
        }
        if !self.is_player(email) {
            return Err(DomainError::PlayerNotRecognized(email.clone()));
        }

        let outcome = match self.lobby.get(email) {
            Some(stored) if stored.same_payload(&contribution) => {
                return Ok(RecordOutcome::Duplicate);
            }
            Some(_) => RecordOutcome::Overwritten,
            None => RecordOutcome::Recorded,
        };
        self.lobby.insert(email.clone(), contribution);
        self.emit(
            SessionEventKind::LobbyContributionRecorded(LobbyContributionRecorded {
                player: email.clone(),
            }),
            correlation_id,
            clock.now(),
        );
        Ok(outcome)
    }

    /// Re-evaluates quorum during onboarding.
    ///
    /// At quorum the session activates and opens turn 1 with every current
    /// player required, seeded from the lobby; if that already covers every
    /// player, the turn is claimed in the same commit. Below quorum an
    /// initializing session moves to waiting for players.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` once onboarding is over.
    pub fn settle_membership(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Progress, DomainError> {
        if !self.status.accepts_new_players() {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                event: LifecycleEvent::QuorumReached.as_str(),
            });
        }
        let now = clock.now();
        let count = u32::try_from(self.players.len()).unwrap_or(u32::MAX);

        if count < self.min_players {
            if self.status == SessionStatus::Initializing {
                self.change_status(LifecycleEvent::AwaitPlayers, correlation_id, now)?;
            }
            return Ok(Progress::AwaitingPlayers {
                needed: self.min_players - count,
            });
        }

        self.change_status(LifecycleEvent::QuorumReached, correlation_id, now)?;
        self.open_turn(correlation_id, now);
        for (player, contribution) in std::mem::take(&mut self.lobby) {
            if let Some(turn) = self.current_turn_mut() {
                turn.record(&player, contribution)?;
            }
            self.emit(
                SessionEventKind::ContributionRecorded(ContributionRecorded {
                    turn_number: self.current_turn_number,
                    player,
                    overwritten: false,
                }),
                correlation_id,
                now,
            );
        }
        self.claim_if_complete(correlation_id, now)
    }

    fn open_turn(&mut self, correlation_id: Uuid, now: DateTime<Utc>) {
        self.current_turn_number += 1;
        let required: BTreeSet<PlayerEmail> = self.player_emails().into_iter().collect();
        let turn = Turn::open(
            self.current_turn_number,
            required,
            now,
            self.timeouts.turn_timeout(),
        );
        let opened = TurnOpened {
            turn_number: turn.number,
            deadline: turn.deadline,
            required: turn.required.len(),
        };
        self.turns.push(turn);
        self.emit(SessionEventKind::TurnOpened(opened), correlation_id, now);
    }

    fn claim_if_complete(
        &mut self,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Progress, DomainError> {
        let Some(turn) = self.current_turn_mut() else {
            return Ok(self.progress());
        };
        if turn.status != TurnStatus::Waiting || !turn.all_responded() {
            return Ok(self.progress());
        }
        turn.begin_processing(TurnEvent::AllResponded, now)?;
        let turn_number = turn.number;
        self.emit(
            SessionEventKind::TurnProcessingStarted(TurnProcessingStarted {
                turn_number,
                forced: false,
            }),
            correlation_id,
            now,
        );
        Ok(Progress::Claimed { turn_number })
    }

    /// Where the session stands right now, without changing anything.
    #[must_use]
    pub fn progress(&self) -> Progress {
        if self.status.accepts_new_players() {
            let count = u32::try_from(self.players.len()).unwrap_or(u32::MAX);
            return Progress::AwaitingPlayers {
                needed: self.min_players.saturating_sub(count),
            };
        }
        match (self.status, self.current_turn()) {
            (SessionStatus::Active, Some(turn)) if turn.status == TurnStatus::Waiting => {
                Progress::Waiting {
                    turn_number: turn.number,
                    pending: turn.pending().into_iter().cloned().collect(),
                }
            }
            (SessionStatus::Active, Some(turn)) if turn.status == TurnStatus::Processing => {
                Progress::Claimed {
                    turn_number: turn.number,
                }
            }
            (status, _) => Progress::Closed(status),
        }
    }

    /// Records a contribution to a session's turn.
    ///
    /// `turn_number` defaults to the current turn. An identical redelivery
    /// of a stored contribution is reported as `RecordOutcome::Duplicate`
    /// and changes nothing, even for an older turn. A submission resets the
    /// sender's miss streak. When the submission completes the turn, the
    /// turn is claimed in the same commit.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidTransition` for new content once the session
    ///   is no longer active
    /// - `DomainError::PlayerNotRecognized` for non-members
    /// - `DomainError::StaleTurn` for a different contribution to an old turn
    /// - `DomainError::TurnClosed` for a different contribution to a claimed turn
    /// - `DomainError::Validation` for a turn that has not opened
    pub fn record_submission(
        &mut self,
        email: &PlayerEmail,
        turn_number: Option<u32>,
        contribution: Contribution,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(RecordOutcome, Progress), DomainError> {
        let current = self.current_turn_number;
        let target = turn_number.unwrap_or(current);
        if self.status != SessionStatus::Active {
            // A closed session still acknowledges what it already stored.
            if self.is_redelivery(email, target, &contribution) {
                return Ok((RecordOutcome::Duplicate, self.progress()));
            }
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                event: "submit_contribution",
            });
        }
        if !self.is_player(email) {
            return Err(DomainError::PlayerNotRecognized(email.clone()));
        }

        if target > current {
            return Err(DomainError::Validation(format!(
                "turn {target} has not opened yet"
            )));
        }
        if target < current {
            if self.is_redelivery(email, target, &contribution) {
                return Ok((RecordOutcome::Duplicate, self.progress()));
            }
            return Err(DomainError::StaleTurn {
                submitted: target,
                current,
            });
        }

        let now = clock.now();
        let turn = self
            .current_turn_mut()
            .ok_or_else(|| DomainError::Infrastructure(format!("turn {current} missing")))?;
        let outcome = turn.record(email, contribution)?;
        if outcome == RecordOutcome::Duplicate {
            return Ok((outcome, self.progress()));
        }

        if let Some(player) = self.players.iter_mut().find(|p| &p.email == email) {
            player.consecutive_misses = 0;
        }
        self.emit(
            SessionEventKind::ContributionRecorded(ContributionRecorded {
                turn_number: current,
                player: email.clone(),
                overwritten: outcome == RecordOutcome::Overwritten,
            }),
            correlation_id,
            now,
        );
        let progress = self.claim_if_complete(correlation_id, now)?;
        Ok((outcome, progress))
    }

    /// Whether `contribution` is exactly what `email` already has stored for
    /// `turn_number`, or in the lobby before any turn opened.
    fn is_redelivery(
        &self,
        email: &PlayerEmail,
        turn_number: u32,
        contribution: &Contribution,
    ) -> bool {
        let stored = if turn_number == 0 {
            self.lobby.get(email)
        } else {
            self.turn(turn_number)
                .and_then(|turn| turn.contribution_of(email))
        };
        stored.is_some_and(|stored| stored.same_payload(contribution))
    }

    /// Claims the current turn with partial data after a timeout.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless an active session's
    /// current turn is waiting.
    pub fn force_processing(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<u32, DomainError> {
        let status = self.status;
        let now = clock.now();
        let turn = self
            .current_turn_mut()
            .filter(|_| status == SessionStatus::Active)
            .ok_or(DomainError::InvalidTransition {
                from: status.as_str(),
                event: TurnEvent::TimeoutForced.as_str(),
            })?;
        turn.begin_processing(TurnEvent::TimeoutForced, now)?;
        let turn_number = turn.number;
        self.emit(
            SessionEventKind::TurnProcessingStarted(TurnProcessingStarted {
                turn_number,
                forced: true,
            }),
            correlation_id,
            now,
        );
        Ok(turn_number)
    }

    /// Renews the claim on a turn whose processing lease expired.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the current turn is
    /// processing.
    pub fn reclaim_processing(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<u32, DomainError> {
        let status = self.status;
        let now = clock.now();
        let turn = self
            .current_turn_mut()
            .filter(|_| status == SessionStatus::Active)
            .ok_or(DomainError::InvalidTransition {
                from: status.as_str(),
                event: "reclaim",
            })?;
        turn.reclaim(now)?;
        let turn_number = turn.number;
        self.emit(
            SessionEventKind::TurnReclaimed(TurnReclaimed { turn_number }),
            correlation_id,
            now,
        );
        Ok(turn_number)
    }

    /// Commits narration for a claimed turn.
    ///
    /// `claim` is the `processing_started_at` observed when the turn was
    /// claimed; a mismatch means another invocation has taken over. Opens the
    /// next turn, or completes the session when `end_session` is set.
    /// Returns the number of the newly opened turn.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TurnClosed` if the claim is no longer held and
    /// `DomainError::InvalidTransition` if the session left the active state.
    pub fn complete_turn(
        &mut self,
        turn_number: u32,
        claim: DateTime<Utc>,
        narrative: String,
        end_session: bool,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Option<u32>, DomainError> {
        if self.status != SessionStatus::Active {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                event: TurnEvent::NarrationCommitted.as_str(),
            });
        }
        let now = clock.now();
        let turn = self
            .current_turn_mut()
            .filter(|turn| {
                turn.number == turn_number
                    && turn.status == TurnStatus::Processing
                    && turn.processing_started_at == Some(claim)
            })
            .ok_or(DomainError::TurnClosed(turn_number))?;
        turn.complete(narrative, now)?;
        self.emit(
            SessionEventKind::TurnCompleted(TurnCompleted { turn_number }),
            correlation_id,
            now,
        );

        if end_session {
            self.change_status(LifecycleEvent::Complete, correlation_id, now)?;
            return Ok(None);
        }
        self.open_turn(correlation_id, now);
        Ok(Some(self.current_turn_number))
    }

    /// Writes the reminder marker for a player on the current turn. Returns
    /// `false` if it was already written.
    pub fn mark_reminded(
        &mut self,
        player: &PlayerEmail,
        sent: bool,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        let turn_number = self.current_turn_number;
        let marked = self
            .current_turn_mut()
            .is_some_and(|turn| turn.mark_reminded(player));
        if marked {
            self.emit(
                SessionEventKind::ReminderMarked(ReminderMarked {
                    turn_number,
                    player: player.clone(),
                    sent,
                }),
                correlation_id,
                clock.now(),
            );
        }
        marked
    }

    /// Marks a silent player missed on the current turn and bumps their miss
    /// streak. Returns the new streak, or `None` if the player was already
    /// marked or has responded.
    pub fn mark_missed(
        &mut self,
        player: &PlayerEmail,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Option<u32> {
        let now = clock.now();
        let turn_number = self.current_turn_number;
        let marked = self
            .current_turn_mut()
            .is_some_and(|turn| turn.mark_missed(player, now));
        if !marked {
            return None;
        }
        let entry = self.players.iter_mut().find(|p| &p.email == player)?;
        entry.consecutive_misses += 1;
        let consecutive_misses = entry.consecutive_misses;
        self.emit(
            SessionEventKind::ResponseMissed(ResponseMissed {
                turn_number,
                player: player.clone(),
                consecutive_misses,
            }),
            correlation_id,
            now,
        );
        Some(consecutive_misses)
    }

    /// Whether any player's miss streak exceeds the configured threshold.
    #[must_use]
    pub fn miss_threshold_exceeded(&self) -> bool {
        self.players
            .iter()
            .any(|p| p.consecutive_misses > self.timeouts.max_consecutive_misses)
    }

    /// Drives the session to `Abandoned`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if `cause` does not apply to
    /// the current status.
    pub fn abandon(
        &mut self,
        cause: LifecycleEvent,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.change_status(cause, correlation_id, clock.now())
    }

    /// Completes an active session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the session is active.
    pub fn complete(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.change_status(LifecycleEvent::Complete, correlation_id, clock.now())
    }

    /// Appends a narrator state note.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the session is active.
    pub fn record_note(
        &mut self,
        state_update: String,
        reason: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status != SessionStatus::Active {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                event: "update_game_state",
            });
        }
        let now = clock.now();
        self.notes.push(NarratorNote {
            turn_number: self.current_turn_number,
            state_update,
            reason: reason.clone(),
            recorded_at: now,
        });
        self.emit(
            SessionEventKind::NarratorNoteRecorded(NarratorNoteRecorded {
                turn_number: self.current_turn_number,
                reason,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Earliest instant at which the timeout sweep has work for this
    /// session. Persisted alongside the snapshot as the due-list index.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        if self.status.accepts_new_players() {
            return Some(self.created_at + self.timeouts.join_timeout());
        }
        if self.status != SessionStatus::Active {
            return None;
        }
        let turn = self.current_turn()?;
        match turn.status {
            TurnStatus::Waiting => {
                let pending = turn.pending();
                if pending.is_empty() {
                    None
                } else if pending.iter().any(|p| !turn.reminded.contains(*p)) {
                    Some(turn.deadline)
                } else {
                    Some(turn.deadline + self.timeouts.missed_turn_grace())
                }
            }
            TurnStatus::Processing => turn
                .processing_started_at
                .map(|claimed| claimed + self.timeouts.processing_lease()),
            TurnStatus::Completed => None,
        }
    }

    /// Serializes the session for a write that expects the loaded version.
    #[must_use]
    pub fn to_stored(&self) -> StoredSession {
        StoredSession {
            session_id: self.id.clone(),
            version: self.version + 1,
            status: self.status.as_str().to_owned(),
            next_deadline: self.next_deadline(),
            // Serialization of derived Serialize types to Value is infallible.
            payload: serde_json::to_value(self).expect("Session serialization is infallible"),
            updated_at: self.updated_at,
        }
    }

    /// Restores a session from its stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload does not
    /// deserialize.
    pub fn from_stored(stored: &StoredSession) -> Result<Self, DomainError> {
        let mut session: Self = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!("session deserialization failed: {e}"))
        })?;
        session.version = stored.version;
        Ok(session)
    }
}

impl AggregateRoot for Session {
    type Event = SessionEvent;

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn mark_committed(&mut self, version: i64) {
        self.version = version;
        self.uncommitted_events.clear();
    }
}
