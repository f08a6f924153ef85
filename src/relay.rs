//! Fan-out of a source message to the destination chats

use tracing::{debug, info, warn};

use crate::metrics;
use crate::platform::{Platform, SourceMessage};

/// Result of sending to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Dry-run mode; nothing was sent.
    DryRun,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub destination: i64,
    pub delivery: Delivery,
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub message_id: i32,
    /// Same id as the previously relayed message; nothing was attempted.
    pub duplicate: bool,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl RelayReport {
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.delivery == Delivery::Sent)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.delivery, Delivery::Failed(_)))
    }
}

/// Sends source messages to every destination, skipping an immediate repeat.
#[derive(Debug, Clone)]
pub struct Relay {
    destinations: Vec<i64>,
    last_relayed: Option<i32>,
    dry_run: bool,
}

impl Relay {
    pub fn new(destinations: Vec<i64>) -> Self {
        Self {
            destinations,
            last_relayed: None,
            dry_run: false,
        }
    }

    /// Log messages instead of sending them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn destinations(&self) -> &[i64] {
        &self.destinations
    }

    pub fn last_relayed(&self) -> Option<i32> {
        self.last_relayed
    }

    /// Send `message` to every destination in order.
    ///
    /// A failed send does not stop the remaining ones; every outcome is reported.
    /// The marker advances even when some sends failed.
    pub async fn relay<P>(&mut self, platform: &P, message: &SourceMessage) -> RelayReport
    where
        P: Platform + ?Sized,
    {
        if self.last_relayed == Some(message.id) {
            debug!(message_id = message.id, "Message already relayed, skipping");
            return RelayReport {
                message_id: message.id,
                duplicate: true,
                outcomes: Vec::new(),
            };
        }

        let mut outcomes = Vec::with_capacity(self.destinations.len());
        for &destination in &self.destinations {
            let delivery = if self.dry_run {
                info!(destination, text = %message.text, "Dry run: would relay message");
                Delivery::DryRun
            } else {
                let random_id = rand::random::<i64>();
                match platform.send_text(destination, &message.text, random_id).await {
                    Ok(()) => Delivery::Sent,
                    Err(err) => {
                        warn!(
                            destination,
                            message_id = message.id,
                            error = %err,
                            "Failed to relay message"
                        );
                        Delivery::Failed(err.to_string())
                    }
                }
            };
            metrics::record_delivery(&delivery);
            outcomes.push(DeliveryOutcome {
                destination,
                delivery,
            });
        }

        self.last_relayed = Some(message.id);
        metrics::record_relayed_message();

        let report = RelayReport {
            message_id: message.id,
            duplicate: false,
            outcomes,
        };
        info!(
            message_id = message.id,
            sent = report.sent(),
            failed = report.failures().count(),
            destinations = self.destinations.len(),
            "Relayed message"
        );
        report
    }
}
