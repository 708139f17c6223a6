//! The turn coordinator.
//!
//! One call handles one inbound submission (or one sweep) end to end. Every
//! step reads the session fresh and commits through the versioned store, so
//! concurrent calls on the same session race only at the commit, and the
//! loser reports a retryable conflict.

use tracing::{debug, info, instrument, warn};
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::identity::SessionId;
use turnpost_core::notifier::{NarrativeDelivery, Notifier, TurnOpening};
use turnpost_core::repository::SessionRepository;
use turnpost_core::rng::DeterministicRng;
use turnpost_gateway::{
    Caller, Narrator, SecurityContext, ToolCallRecord, ToolGateway, ToolRegistry, TurnContext,
};
use turnpost_scheduler::{SweepOutcome, TimeoutScheduler};
use turnpost_session::application::command_handlers::handle_start_session;
use turnpost_session::application::store::SessionStore;
use turnpost_session::domain::aggregates::{Progress, Session};
use turnpost_session::domain::commands::{StartSession, SubmissionKind, SubmitContribution};
use turnpost_session::domain::lifecycle::{LifecycleEvent, SessionStatus};
use turnpost_session::domain::player::PlayerRole;
use turnpost_session::domain::timeouts::GameProfile;
use turnpost_session::domain::turn::{Contribution, RecordOutcome};
use uuid::Uuid;

/// A turn this call narrated and committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResolution {
    /// The resolved turn.
    pub turn_number: u32,
    /// Whether the turn was forced by the timeout policy.
    pub forced: bool,
    /// The turn opened next, `None` when the narrative ended the session.
    pub next_turn: Option<u32>,
}

/// What one submission did.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    /// The session the submission went to.
    pub session_id: SessionId,
    /// How the contribution was stored; `None` for a quit.
    pub recorded: Option<RecordOutcome>,
    /// Where the session stands after this call.
    pub progress: Progress,
    /// Set when this call claimed a turn and narrated it.
    pub resolution: Option<TurnResolution>,
    /// Tool calls the narrator made during this call.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Result of sweeping one session through the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct SweptSession {
    /// What the timeout policy applied.
    pub swept: SweepOutcome,
    /// Set when the sweep claimed a turn and this call narrated it.
    pub resolution: Option<TurnResolution>,
}

/// Totals for one sweep over the due list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions on the due list.
    pub examined: usize,
    /// Sessions whose timeout changes were committed.
    pub committed: usize,
    /// Reminders sent.
    pub reminders: usize,
    /// Players newly marked missed.
    pub missed: usize,
    /// Turns narrated after a forced or reclaimed claim.
    pub resolved: usize,
    /// Sessions abandoned by the timeout policy.
    pub abandoned: usize,
    /// Sessions whose sweep returned an error.
    pub failed: usize,
}

/// Narration done within one call.
struct Narration {
    progress: Progress,
    resolution: Option<TurnResolution>,
    tool_calls: Vec<ToolCallRecord>,
}

impl Narration {
    fn idle(progress: Progress) -> Self {
        Self {
            progress,
            resolution: None,
            tool_calls: Vec::new(),
        }
    }
}

/// Coordinates submissions, narration, and timeout sweeps for every session
/// in a repository.
#[derive(Clone, Copy)]
pub struct TurnCoordinator<'a> {
    repo: &'a dyn SessionRepository,
    narrator: &'a dyn Narrator,
    pub(crate) notifier: &'a dyn Notifier,
    registry: &'a ToolRegistry,
    clock: &'a dyn Clock,
}

impl std::fmt::Debug for TurnCoordinator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<'a> TurnCoordinator<'a> {
    #[must_use]
    pub fn new(
        repo: &'a dyn SessionRepository,
        narrator: &'a dyn Narrator,
        notifier: &'a dyn Notifier,
        registry: &'a ToolRegistry,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            repo,
            narrator,
            notifier,
            registry,
            clock,
        }
    }

    /// Starts a session from a first-contact message and answers it: a
    /// profile that activates at once has turn 1 narrated, otherwise the
    /// narrator writes the onboarding reply.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a profile mismatch, and any
    /// error from the commit or the narrator.
    #[instrument(
        skip_all,
        fields(game_type = %command.game_type, correlation_id = %command.correlation_id)
    )]
    pub async fn start_session(
        &self,
        command: &StartSession,
        profile: &GameProfile,
        rng: &mut dyn DeterministicRng,
    ) -> Result<SubmissionOutcome, DomainError> {
        let started =
            handle_start_session(command, profile, self.clock, rng, self.repo).await?;
        let caller = Caller::Player(command.initiator.clone());
        let narration = self
            .advance(&started.session, started.progress, caller, command.correlation_id)
            .await?;
        Ok(SubmissionOutcome {
            session_id: started.session.id,
            recorded: Some(RecordOutcome::Recorded),
            progress: narration.progress,
            resolution: narration.resolution,
            tool_calls: narration.tool_calls,
        })
    }

    /// Handles one validated inbound message.
    ///
    /// A contribution to an active session is stored under its idempotency
    /// key; if it completes the turn, the same commit claims the turn and
    /// this call narrates it. During onboarding an unknown sender joins,
    /// quorum is re-evaluated, and the narrator replies. A quit abandons the
    /// session. Identical redeliveries succeed without changing anything.
    ///
    /// # Errors
    ///
    /// - `DomainError::SessionNotFound` for an unknown session
    /// - `DomainError::InvalidTransition` for new content to a completed or
    ///   abandoned session
    /// - `DomainError::PlayerNotRecognized`, `SessionFull`, `StaleTurn`, `TurnClosed`
    /// - `DomainError::ConcurrencyConflict` when another writer committed first
    #[instrument(
        skip_all,
        fields(
            session_id = %command.session_id,
            correlation_id = %command.correlation_id,
            kind = ?command.kind,
        )
    )]
    pub async fn submit(
        &self,
        command: &SubmitContribution,
    ) -> Result<SubmissionOutcome, DomainError> {
        let session = SessionStore::new(self.repo)
            .get_session(&command.session_id)
            .await?;
        if command.kind == SubmissionKind::Quit {
            return self.quit(session, command).await;
        }

        let contribution = Contribution {
            content: command.content.clone(),
            submitted_at: self.clock.now(),
            attachments: command.attachments.clone(),
        };
        if session.status.accepts_new_players() {
            self.onboard(session, command, contribution).await
        } else {
            self.contribute(session, command, contribution).await
        }
    }

    async fn quit(
        &self,
        mut session: Session,
        command: &SubmitContribution,
    ) -> Result<SubmissionOutcome, DomainError> {
        if !session.is_player(&command.player_email) {
            return Err(DomainError::PlayerNotRecognized(
                command.player_email.clone(),
            ));
        }
        // A redelivered quit finds the session already abandoned.
        if session.status != SessionStatus::Abandoned {
            session.abandon(LifecycleEvent::Quit, command.correlation_id, self.clock)?;
            SessionStore::new(self.repo).put_session(&mut session).await?;
            info!("session abandoned on quit");
        }
        Ok(SubmissionOutcome {
            session_id: session.id.clone(),
            recorded: None,
            progress: session.progress(),
            resolution: None,
            tool_calls: Vec::new(),
        })
    }

    async fn onboard(
        &self,
        mut session: Session,
        command: &SubmitContribution,
        contribution: Contribution,
    ) -> Result<SubmissionOutcome, DomainError> {
        let email = &command.player_email;
        let correlation_id = command.correlation_id;
        let joined = !session.is_player(email)
            && session.register_player(
                email.clone(),
                PlayerRole::Joined,
                correlation_id,
                self.clock,
            )?;
        let recorded =
            session.record_lobby_contribution(email, contribution, correlation_id, self.clock)?;
        if recorded == RecordOutcome::Duplicate && !joined {
            debug!("duplicate onboarding message");
            return Ok(SubmissionOutcome {
                session_id: session.id.clone(),
                recorded: Some(recorded),
                progress: session.progress(),
                resolution: None,
                tool_calls: Vec::new(),
            });
        }

        let progress = session.settle_membership(correlation_id, self.clock)?;
        SessionStore::new(self.repo).put_session(&mut session).await?;
        info!(
            joined,
            status = session.status.as_str(),
            players = session.players.len(),
            "onboarding message recorded"
        );
        if session.status == SessionStatus::Active {
            self.announce(&session, &progress).await;
        }

        let narration = self
            .advance(&session, progress, Caller::Player(email.clone()), correlation_id)
            .await?;
        Ok(SubmissionOutcome {
            session_id: session.id,
            recorded: Some(recorded),
            progress: narration.progress,
            resolution: narration.resolution,
            tool_calls: narration.tool_calls,
        })
    }

    async fn contribute(
        &self,
        mut session: Session,
        command: &SubmitContribution,
        contribution: Contribution,
    ) -> Result<SubmissionOutcome, DomainError> {
        let (recorded, progress) = SessionStore::new(self.repo)
            .append_contribution(
                &mut session,
                &command.player_email,
                command.turn_number,
                contribution,
                command.correlation_id,
                self.clock,
            )
            .await?;

        // A duplicate may land on a turn someone else already claimed.
        let narration = if recorded == RecordOutcome::Duplicate {
            debug!("duplicate contribution");
            Narration::idle(progress)
        } else {
            info!(
                turn_number = session.current_turn_number,
                outcome = ?recorded,
                "contribution recorded"
            );
            let caller = Caller::Player(command.player_email.clone());
            self.advance(&session, progress, caller, command.correlation_id)
                .await?
        };
        Ok(SubmissionOutcome {
            session_id: session.id,
            recorded: Some(recorded),
            progress: narration.progress,
            resolution: narration.resolution,
            tool_calls: narration.tool_calls,
        })
    }

    /// Follows up on a commit this call made.
    async fn advance(
        &self,
        session: &Session,
        progress: Progress,
        caller: Caller,
        correlation_id: Uuid,
    ) -> Result<Narration, DomainError> {
        match progress {
            Progress::Claimed { turn_number } => {
                self.resolve(session, turn_number, caller, correlation_id)
                    .await
            }
            Progress::AwaitingPlayers { .. } => {
                self.narrate_onboarding(session, caller, correlation_id)
                    .await
            }
            progress => Ok(Narration::idle(progress)),
        }
    }

    /// Runs the narrator for an onboarding reply, then re-evaluates quorum
    /// for any players it invited.
    async fn narrate_onboarding(
        &self,
        session: &Session,
        caller: Caller,
        correlation_id: Uuid,
    ) -> Result<Narration, DomainError> {
        let context = TurnContext::onboarding(session);
        let security = SecurityContext::bind(session, caller.clone(), self.registry);
        let gateway = ToolGateway::bind(
            security,
            self.registry,
            self.repo,
            self.clock,
            correlation_id,
        );
        let output = self.narrator.generate(&context, &gateway).await?;
        let mut tool_calls = gateway.into_records();
        if output.end_session {
            debug!("end of story requested during onboarding, ignored");
        }

        let store = SessionStore::new(self.repo);
        let mut fresh = store.get_session(&session.id).await?;
        let mut progress = fresh.progress();
        if matches!(progress, Progress::AwaitingPlayers { needed: 0 }) {
            progress = fresh.settle_membership(correlation_id, self.clock)?;
            store.put_session(&mut fresh).await?;
            info!(
                status = fresh.status.as_str(),
                players = fresh.players.len(),
                "quorum reached through invitations"
            );
        }
        self.deliver(&fresh, None, output.narrative).await;
        self.announce(&fresh, &progress).await;

        let Progress::Claimed { turn_number } = progress else {
            return Ok(Narration {
                progress,
                resolution: None,
                tool_calls,
            });
        };
        let mut narration = self
            .resolve(&fresh, turn_number, caller, correlation_id)
            .await?;
        tool_calls.append(&mut narration.tool_calls);
        narration.tool_calls = tool_calls;
        Ok(narration)
    }

    /// Narrates a turn this call claimed and commits the result.
    ///
    /// The commit is accepted only while the claim observed in `session` is
    /// still the turn's claim. When the turn was reclaimed in the meantime
    /// the narrative is dropped and the call succeeds without a resolution.
    async fn resolve(
        &self,
        session: &Session,
        turn_number: u32,
        caller: Caller,
        correlation_id: Uuid,
    ) -> Result<Narration, DomainError> {
        let claim = session
            .turn(turn_number)
            .and_then(|turn| turn.processing_started_at)
            .ok_or(DomainError::TurnClosed(turn_number))?;
        let context = TurnContext::for_turn(session, turn_number)
            .ok_or(DomainError::TurnClosed(turn_number))?;
        let forced = session.turn(turn_number).is_some_and(|turn| turn.forced);

        let security = SecurityContext::bind(session, caller, self.registry);
        let gateway = ToolGateway::bind(
            security,
            self.registry,
            self.repo,
            self.clock,
            correlation_id,
        );
        let output = self.narrator.generate(&context, &gateway).await?;
        let tool_calls = gateway.into_records();

        // Tools may have committed in the meantime.
        let store = SessionStore::new(self.repo);
        let mut fresh = store.get_session(&session.id).await?;
        let completed = fresh.complete_turn(
            turn_number,
            claim,
            output.narrative.clone(),
            output.end_session,
            correlation_id,
            self.clock,
        );
        let next_turn = match completed {
            Ok(next_turn) => next_turn,
            // The lease ran out mid-narration and the turn now belongs to
            // whoever reclaimed it, or the session closed meanwhile.
            Err(DomainError::TurnClosed(_) | DomainError::InvalidTransition { .. }) => {
                warn!(turn_number, "claim lost to a reclaim, narration discarded");
                return Ok(Narration {
                    progress: fresh.progress(),
                    resolution: None,
                    tool_calls,
                });
            }
            Err(err) => return Err(err),
        };
        store.put_session(&mut fresh).await?;
        info!(
            turn_number,
            forced,
            next_turn = ?next_turn,
            tool_calls = tool_calls.len(),
            status = fresh.status.as_str(),
            "turn resolved"
        );
        self.deliver(&fresh, Some(turn_number), output.narrative).await;

        Ok(Narration {
            progress: fresh.progress(),
            resolution: Some(TurnResolution {
                turn_number,
                forced,
                next_turn,
            }),
            tool_calls,
        })
    }

    async fn deliver(&self, session: &Session, turn_number: Option<u32>, narrative: String) {
        let delivery = NarrativeDelivery {
            session_id: session.id.clone(),
            game_type: session.game_type.clone(),
            turn_number,
            recipients: session.player_emails(),
            narrative,
        };
        if let Err(err) = self.notifier.deliver_narrative(&delivery).await {
            warn!(turn_number = ?turn_number, error = %err, "narrative not delivered");
        }
    }

    /// Announces turn 1 of a session that went live while an invited player
    /// still has to write in. Nothing is narrated until they do.
    async fn announce(&self, session: &Session, progress: &Progress) {
        let Progress::Waiting {
            turn_number,
            pending,
        } = progress
        else {
            return;
        };
        let Some(turn) = session.turn(*turn_number) else {
            return;
        };
        let opening = TurnOpening {
            session_id: session.id.clone(),
            game_type: session.game_type.clone(),
            turn_number: *turn_number,
            deadline: turn.deadline,
            recipients: session.player_emails(),
            pending: pending.clone(),
        };
        match self.notifier.announce_turn(&opening).await {
            Ok(()) => info!(
                turn_number = *turn_number,
                pending = pending.len(),
                "turn opening announced"
            ),
            Err(err) => warn!(turn_number = *turn_number, error = %err, "turn opening not announced"),
        }
    }

    /// Applies due timeouts to one session and narrates a turn the sweep
    /// claimed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if a submission committed
    /// first, and any error from loading or narration.
    #[instrument(skip_all, fields(session_id = %session_id, correlation_id = %correlation_id))]
    pub async fn sweep_session(
        &self,
        session_id: &SessionId,
        correlation_id: Uuid,
    ) -> Result<SweptSession, DomainError> {
        let swept = TimeoutScheduler::new(self.repo, self.notifier, self.clock)
            .sweep_session(session_id, correlation_id)
            .await?;
        let Some(turn_number) = swept.outcome.claimed else {
            return Ok(SweptSession {
                swept,
                resolution: None,
            });
        };

        let session = SessionStore::new(self.repo).get_session(session_id).await?;
        let narration = self
            .resolve(&session, turn_number, Caller::Scheduler, correlation_id)
            .await?;
        Ok(SweptSession {
            swept,
            resolution: narration.resolution,
        })
    }

    /// Sweeps up to `limit` sessions with due timeouts. A failing session is
    /// logged and counted; the rest are still swept.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the due list cannot be read.
    #[instrument(skip(self))]
    pub async fn sweep_due(
        &self,
        limit: usize,
        correlation_id: Uuid,
    ) -> Result<SweepReport, DomainError> {
        let due = TimeoutScheduler::new(self.repo, self.notifier, self.clock)
            .due_sessions(limit)
            .await?;
        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for session_id in &due {
            match self.sweep_session(session_id, correlation_id).await {
                Ok(result) => {
                    let outcome = &result.swept.outcome;
                    report.committed += usize::from(result.swept.committed);
                    report.reminders += outcome.reminders.len();
                    report.missed += outcome.newly_missed.len();
                    report.abandoned += usize::from(outcome.abandoned.is_some());
                    report.resolved += usize::from(result.resolution.is_some());
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(session_id = %session_id, error = %err, "sweep failed");
                }
            }
        }

        info!(
            examined = report.examined,
            committed = report.committed,
            resolved = report.resolved,
            failed = report.failed,
            "sweep finished"
        );
        Ok(report)
    }
}
