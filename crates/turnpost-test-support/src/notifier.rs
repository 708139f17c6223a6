//! Test notifier: records outbound messages instead of sending them.

use std::sync::Mutex;

use async_trait::async_trait;
use turnpost_core::error::DomainError;
use turnpost_core::identity::PlayerEmail;
use turnpost_core::notifier::{NarrativeDelivery, Notifier, Reminder, TurnOpening};

/// A notifier that keeps every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    reminders: Mutex<Vec<Reminder>>,
    deliveries: Mutex<Vec<NarrativeDelivery>>,
    openings: Mutex<Vec<TurnOpening>>,
    failures: Mutex<Vec<(PlayerEmail, String)>>,
}

impl RecordingNotifier {
    /// Create an empty recording notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reminders(&self) -> Vec<Reminder> {
        self.reminders.lock().unwrap().clone()
    }

    /// Narratives delivered so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn deliveries(&self) -> Vec<NarrativeDelivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Turn openings announced so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn openings(&self) -> Vec<TurnOpening> {
        self.openings.lock().unwrap().clone()
    }

    /// Failure notices sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn failure_notices(&self) -> Vec<(PlayerEmail, String)> {
        self.failures.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reminder(&self, reminder: &Reminder) -> Result<(), DomainError> {
        self.reminders.lock().unwrap().push(reminder.clone());
        Ok(())
    }

    async fn deliver_narrative(&self, delivery: &NarrativeDelivery) -> Result<(), DomainError> {
        self.deliveries.lock().unwrap().push(delivery.clone());
        Ok(())
    }

    async fn announce_turn(&self, opening: &TurnOpening) -> Result<(), DomainError> {
        self.openings.lock().unwrap().push(opening.clone());
        Ok(())
    }

    async fn send_failure_notice(
        &self,
        recipient: &PlayerEmail,
        message: &str,
    ) -> Result<(), DomainError> {
        self.failures
            .lock()
            .unwrap()
            .push((recipient.clone(), message.to_owned()));
        Ok(())
    }
}
