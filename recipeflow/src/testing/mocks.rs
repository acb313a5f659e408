//! Mock publishers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::PublishError;
use crate::messages::{MessagePublisher, OrderReport, OutboundMessage, StepDescription};

/// A publisher that records every message instead of sending it.
///
/// It can be switched into a failing mode, in which step publishes are
/// rejected as if the broker were unreachable. Order reports are always
/// recorded.
#[derive(Debug, Default)]
pub struct CollectingPublisher {
    messages: Mutex<Vec<OutboundMessage>>,
    fail_steps: Mutex<bool>,
}

impl CollectingPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that rejects every step.
    #[must_use]
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.set_failing(true);
        publisher
    }

    /// Makes subsequent step publishes fail or succeed.
    pub fn set_failing(&self, failing: bool) {
        *self.fail_steps.lock() = failing;
    }

    /// Returns every recorded message, in publish order.
    #[must_use]
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().clone()
    }

    /// Returns the recorded step descriptions with their queues.
    #[must_use]
    pub fn steps(&self) -> Vec<(String, StepDescription)> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Step { queue, description } => Some((queue.clone(), description.clone())),
                OutboundMessage::OrderReport { .. } => None,
            })
            .collect()
    }

    /// Returns the most recently published step.
    #[must_use]
    pub fn last_step(&self) -> Option<(String, StepDescription)> {
        self.steps().pop()
    }

    /// Returns the recorded order reports.
    #[must_use]
    pub fn order_reports(&self) -> Vec<OrderReport> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::OrderReport { report, .. } => Some(report.clone()),
                OutboundMessage::Step { .. } => None,
            })
            .collect()
    }

    /// Forgets all recorded messages.
    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

#[async_trait]
impl MessagePublisher for CollectingPublisher {
    async fn publish_step(&self, queue: &str, description: StepDescription) -> Result<(), PublishError> {
        if *self.fail_steps.lock() {
            return Err(PublishError::closed(queue));
        }
        self.messages.lock().push(OutboundMessage::Step {
            queue: queue.to_string(),
            description,
        });
        Ok(())
    }

    async fn publish_order_report(&self, topic: &str, report: OrderReport) -> Result<(), PublishError> {
        self.messages.lock().push(OutboundMessage::OrderReport {
            topic: topic.to_string(),
            report,
        });
        Ok(())
    }
}
