//! Timeout evaluation and application.

use chrono::{DateTime, Utc};
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::identity::PlayerEmail;
use turnpost_core::notifier::Reminder;
use turnpost_session::domain::aggregates::Session;
use turnpost_session::domain::lifecycle::{LifecycleEvent, SessionStatus};
use turnpost_session::domain::turn::TurnStatus;
use uuid::Uuid;

/// One thing the sweep should do to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutAction {
    /// The deadline passed inside the reminder window.
    SendReminder(PlayerEmail),
    /// The reminder window closed before any sweep ran. The marker is written
    /// without a notification so the due index moves on to the miss.
    ReminderLapsed(PlayerEmail),
    /// The missed-turn grace period is over.
    MarkMissed(PlayerEmail),
    /// Quorum was not reached within the join window.
    AbandonJoinWindow,
    /// The processing lease on the current turn expired.
    ReclaimProcessing,
}

/// Actions due for one session at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutPlan {
    pub turn_number: u32,
    pub actions: Vec<TimeoutAction>,
}

impl TimeoutPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Computes which timeout actions are due at `now`. Pure; calling it twice
/// with the same inputs gives the same plan.
#[must_use]
pub fn evaluate(session: &Session, now: DateTime<Utc>) -> TimeoutPlan {
    let mut plan = TimeoutPlan {
        turn_number: session.current_turn_number,
        actions: Vec::new(),
    };

    if session.status.accepts_new_players() {
        if now >= session.created_at + session.timeouts.join_timeout() {
            plan.actions.push(TimeoutAction::AbandonJoinWindow);
        }
        return plan;
    }
    if session.status != SessionStatus::Active {
        return plan;
    }
    let Some(turn) = session.current_turn() else {
        return plan;
    };

    match turn.status {
        TurnStatus::Waiting => {
            let reminder_closes = turn.deadline + session.timeouts.reminder_grace();
            let missed_at = turn.deadline + session.timeouts.missed_turn_grace();
            for player in turn.pending() {
                let reminded = turn.reminded.contains(player);
                let action = if now < turn.deadline {
                    None
                } else if now >= missed_at {
                    Some(TimeoutAction::MarkMissed(player.clone()))
                } else if reminded {
                    None
                } else if now < reminder_closes {
                    Some(TimeoutAction::SendReminder(player.clone()))
                } else {
                    Some(TimeoutAction::ReminderLapsed(player.clone()))
                };
                plan.actions.extend(action);
            }
        }
        TurnStatus::Processing => {
            let lease_expired = turn
                .processing_started_at
                .is_some_and(|claimed| now >= claimed + session.timeouts.processing_lease());
            if lease_expired {
                plan.actions.push(TimeoutAction::ReclaimProcessing);
            }
        }
        TurnStatus::Completed => {}
    }
    plan
}

/// What applying a plan changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutOutcome {
    /// Reminders to send once the commit has succeeded.
    pub reminders: Vec<Reminder>,
    /// Players newly marked missed, with their new miss streak.
    pub newly_missed: Vec<(PlayerEmail, u32)>,
    /// Turn claimed for narration by this commit (forced or reclaimed).
    pub claimed: Option<u32>,
    /// Why the session was abandoned, if it was.
    pub abandoned: Option<LifecycleEvent>,
    /// Whether anything needs committing.
    pub changed: bool,
}

/// Applies a plan to a freshly loaded session.
///
/// Missed responses force the turn into processing with partial data,
/// unless a miss streak now exceeds the threshold, in which case the session
/// is abandoned. Markers already present are skipped, so applying a plan
/// computed from an older copy is harmless.
///
/// # Errors
///
/// Propagates `DomainError::InvalidTransition` from the state machines.
pub fn apply(
    session: &mut Session,
    plan: &TimeoutPlan,
    correlation_id: Uuid,
    clock: &dyn Clock,
) -> Result<TimeoutOutcome, DomainError> {
    let mut outcome = TimeoutOutcome::default();

    for action in &plan.actions {
        match action {
            TimeoutAction::SendReminder(player) => {
                if session.mark_reminded(player, true, correlation_id, clock) {
                    outcome.changed = true;
                    if let Some(turn) = session.current_turn() {
                        outcome.reminders.push(Reminder {
                            session_id: session.id.clone(),
                            game_type: session.game_type.clone(),
                            turn_number: turn.number,
                            player: player.clone(),
                            deadline: turn.deadline,
                        });
                    }
                }
            }
            TimeoutAction::ReminderLapsed(player) => {
                outcome.changed |= session.mark_reminded(player, false, correlation_id, clock);
            }
            TimeoutAction::MarkMissed(player) => {
                if let Some(streak) = session.mark_missed(player, correlation_id, clock) {
                    outcome.changed = true;
                    outcome.newly_missed.push((player.clone(), streak));
                }
            }
            TimeoutAction::AbandonJoinWindow => {
                session.abandon(LifecycleEvent::JoinWindowExpired, correlation_id, clock)?;
                outcome.abandoned = Some(LifecycleEvent::JoinWindowExpired);
                outcome.changed = true;
            }
            TimeoutAction::ReclaimProcessing => {
                outcome.claimed = Some(session.reclaim_processing(correlation_id, clock)?);
                outcome.changed = true;
            }
        }
    }

    if !outcome.newly_missed.is_empty() {
        if session.miss_threshold_exceeded() {
            session.abandon(LifecycleEvent::MissThresholdExceeded, correlation_id, clock)?;
            outcome.abandoned = Some(LifecycleEvent::MissThresholdExceeded);
        } else {
            outcome.claimed = Some(session.force_processing(correlation_id, clock)?);
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use turnpost_core::identity::{GameType, SessionId};
    use turnpost_session::domain::player::PlayerRole;
    use turnpost_session::domain::timeouts::{GameProfile, TimeoutConfig};
    use turnpost_session::domain::turn::Contribution;
    use turnpost_test_support::{FixedClock, ManualClock};

    use super::*;

    fn opened_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn email(raw: &str) -> PlayerEmail {
        PlayerEmail::parse(raw).unwrap()
    }

    fn contribution(content: &str) -> Contribution {
        Contribution {
            content: content.to_owned(),
            submitted_at: opened_at(),
            attachments: Vec::new(),
        }
    }

    /// Two players, turn 1 open since `opened_at`, nobody has answered.
    fn active_session(config: TimeoutConfig) -> Session {
        let clock = FixedClock(opened_at());
        let mut session = Session::start(
            SessionId::parse("abc234").unwrap(),
            &GameProfile {
                game_type: GameType::from_static("dungeon"),
                min_players: 2,
                max_players: 4,
                timeouts: config,
            },
            email("a@example.com"),
            contribution("hello"),
            Uuid::new_v4(),
            &clock,
        );
        session.lobby.clear();
        session
            .register_player(email("b@example.com"), PlayerRole::Joined, Uuid::new_v4(), &clock)
            .unwrap();
        session.settle_membership(Uuid::new_v4(), &clock).unwrap();
        session
    }

    fn day_turns() -> TimeoutConfig {
        TimeoutConfig {
            turn_timeout_secs: 24 * 60 * 60,
            ..TimeoutConfig::default()
        }
    }

    #[test]
    fn test_nothing_is_due_before_the_deadline() {
        let session = active_session(day_turns());

        let plan = evaluate(&session, opened_at() + Duration::hours(23));

        assert!(plan.is_empty());
    }

    #[test]
    fn test_reminder_at_deadline_and_miss_after_grace() {
        // Arrange
        let mut session = active_session(day_turns());
        let clock = ManualClock::new(opened_at() + Duration::hours(24));
        session
            .record_submission(&email("a@example.com"), None, contribution("I wait"), Uuid::new_v4(), &clock)
            .unwrap();
        let b = email("b@example.com");

        // Act
        let at_deadline = evaluate(&session, clock.now());
        let reminded = apply(&mut session, &at_deadline, Uuid::new_v4(), &clock).unwrap();
        clock.advance(Duration::hours(1));
        let after_grace = evaluate(&session, clock.now());
        let missed = apply(&mut session, &after_grace, Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert_eq!(at_deadline.actions, vec![TimeoutAction::SendReminder(b.clone())]);
        assert_eq!(reminded.reminders.len(), 1);
        assert_eq!(reminded.reminders[0].player, b);
        assert_eq!(reminded.reminders[0].turn_number, 1);
        assert_eq!(after_grace.actions, vec![TimeoutAction::MarkMissed(b.clone())]);
        assert_eq!(missed.newly_missed, vec![(b.clone(), 1)]);
        assert_eq!(missed.claimed, Some(1));
        assert_eq!(session.player(&b).unwrap().consecutive_misses, 1);
        assert_eq!(session.current_turn().unwrap().status, TurnStatus::Processing);
        assert!(session.current_turn().unwrap().forced);
    }

    #[test]
    fn test_second_evaluation_of_same_instant_is_a_no_op() {
        let mut session = active_session(day_turns());
        let clock = FixedClock(opened_at() + Duration::hours(24));
        let plan = evaluate(&session, clock.now());
        apply(&mut session, &plan, Uuid::new_v4(), &clock).unwrap();

        let again = evaluate(&session, clock.now());
        let stale_replay = apply(&mut session, &plan, Uuid::new_v4(), &clock).unwrap();

        assert!(again.is_empty());
        assert!(!stale_replay.changed);
        assert!(stale_replay.reminders.is_empty());
    }

    #[test]
    fn test_lapsed_reminder_window_writes_marker_without_notification() {
        let mut session = active_session(TimeoutConfig {
            reminder_grace_secs: 30 * 60,
            missed_turn_grace_secs: 2 * 60 * 60,
            ..day_turns()
        });
        let clock = FixedClock(opened_at() + Duration::hours(25));

        let plan = evaluate(&session, clock.now());
        let outcome = apply(&mut session, &plan, Uuid::new_v4(), &clock).unwrap();

        assert_eq!(plan.actions.len(), 2);
        assert!(matches!(plan.actions[0], TimeoutAction::ReminderLapsed(_)));
        assert!(outcome.changed);
        assert!(outcome.reminders.is_empty());
        assert_eq!(
            session.next_deadline(),
            Some(opened_at() + Duration::hours(26))
        );
    }

    #[test]
    fn test_miss_streak_over_threshold_abandons() {
        let mut session = active_session(day_turns());
        session.players[1].consecutive_misses = session.timeouts.max_consecutive_misses;
        let clock = FixedClock(opened_at() + Duration::hours(30));

        let plan = evaluate(&session, clock.now());
        let outcome = apply(&mut session, &plan, Uuid::new_v4(), &clock).unwrap();

        assert_eq!(outcome.abandoned, Some(LifecycleEvent::MissThresholdExceeded));
        assert_eq!(outcome.claimed, None);
        assert_eq!(session.status, SessionStatus::Abandoned);
        assert!(evaluate(&session, clock.now()).is_empty());
    }

    #[test]
    fn test_join_window_expiry_abandons_onboarding_session() {
        let clock = FixedClock(opened_at());
        let mut session = Session::start(
            SessionId::parse("abc234").unwrap(),
            &GameProfile::intimacy(TimeoutConfig::default()),
            email("a@example.com"),
            contribution("anyone?"),
            Uuid::new_v4(),
            &clock,
        );
        let late = FixedClock(opened_at() + session.timeouts.join_timeout());

        let plan = evaluate(&session, late.now());
        let outcome = apply(&mut session, &plan, Uuid::new_v4(), &late).unwrap();

        assert_eq!(plan.actions, vec![TimeoutAction::AbandonJoinWindow]);
        assert_eq!(outcome.abandoned, Some(LifecycleEvent::JoinWindowExpired));
        assert_eq!(session.status, SessionStatus::Abandoned);
    }

    #[test]
    fn test_expired_processing_lease_is_reclaimed() {
        let mut session = active_session(day_turns());
        let clock = ManualClock::new(opened_at());
        session.force_processing(Uuid::new_v4(), &clock).unwrap();
        clock.advance(session.timeouts.processing_lease() - Duration::seconds(1));
        assert!(evaluate(&session, clock.now()).is_empty());
        clock.advance(Duration::seconds(1));

        let plan = evaluate(&session, clock.now());
        let outcome = apply(&mut session, &plan, Uuid::new_v4(), &clock).unwrap();

        assert_eq!(plan.actions, vec![TimeoutAction::ReclaimProcessing]);
        assert_eq!(outcome.claimed, Some(1));
        assert_eq!(
            session.current_turn().unwrap().processing_started_at,
            Some(clock.now())
        );
    }
}
