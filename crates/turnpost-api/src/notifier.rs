//! Notifier that writes outbound messages to the log.
//!
//! Mail transport lives outside this server; deployments that relay mail
//! read these records from the log pipeline.

use async_trait::async_trait;
use tracing::info;
use turnpost_core::error::DomainError;
use turnpost_core::identity::PlayerEmail;
use turnpost_core::notifier::{NarrativeDelivery, Notifier, Reminder, TurnOpening};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reminder(&self, reminder: &Reminder) -> Result<(), DomainError> {
        info!(
            session_id = %reminder.session_id,
            game_type = %reminder.game_type,
            turn_number = reminder.turn_number,
            recipient = %reminder.player,
            deadline = %reminder.deadline,
            "outbound reminder"
        );
        Ok(())
    }

    async fn deliver_narrative(&self, delivery: &NarrativeDelivery) -> Result<(), DomainError> {
        info!(
            session_id = %delivery.session_id,
            game_type = %delivery.game_type,
            turn_number = ?delivery.turn_number,
            recipients = delivery.recipients.len(),
            narrative = %delivery.narrative,
            "outbound narrative"
        );
        Ok(())
    }

    async fn announce_turn(&self, opening: &TurnOpening) -> Result<(), DomainError> {
        info!(
            session_id = %opening.session_id,
            game_type = %opening.game_type,
            turn_number = opening.turn_number,
            recipients = opening.recipients.len(),
            pending = opening.pending.len(),
            deadline = %opening.deadline,
            "outbound turn opening"
        );
        Ok(())
    }

    async fn send_failure_notice(
        &self,
        recipient: &PlayerEmail,
        message: &str,
    ) -> Result<(), DomainError> {
        info!(recipient = %recipient, message, "outbound failure notice");
        Ok(())
    }
}
