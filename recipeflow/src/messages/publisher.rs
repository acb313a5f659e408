//! Outbound seam to the message transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::debug;

use super::wire::{OrderReport, StepDescription};
use crate::core::Goal;
use crate::errors::PublishError;

/// Destination names for outbound messages.
///
/// Every goal's service listens on its own queue, `<prefix>.<service>.tasks`;
/// order reports go to a single topic keyed by order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRouting {
    /// Prefix of every step queue.
    pub queue_prefix: String,
    /// Topic order reports are published to.
    pub order_report_topic: String,
}

impl Default for QueueRouting {
    fn default() -> Self {
        Self {
            queue_prefix: "recipeflow".to_string(),
            order_report_topic: "recipeflow.order.finished".to_string(),
        }
    }
}

impl QueueRouting {
    /// Creates a routing table.
    #[must_use]
    pub fn new(queue_prefix: impl Into<String>, order_report_topic: impl Into<String>) -> Self {
        Self {
            queue_prefix: queue_prefix.into(),
            order_report_topic: order_report_topic.into(),
        }
    }

    /// Returns the queue owned by the service of `goal`.
    #[must_use]
    pub fn step_queue(&self, goal: Goal) -> String {
        format!("{}.{}.tasks", self.queue_prefix, goal.service())
    }
}

/// Publishes messages to the transport.
///
/// Implementations must not wait for a reply: dispatch is fire-and-forget and
/// the answer arrives later as a `StepReport`.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes a step description to a service queue.
    async fn publish_step(&self, queue: &str, description: StepDescription) -> Result<(), PublishError>;

    /// Publishes the terminal report of an order.
    async fn publish_order_report(&self, topic: &str, report: OrderReport) -> Result<(), PublishError>;
}

/// A message as handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A step description.
    Step {
        /// Destination queue.
        queue: String,
        /// The message.
        description: StepDescription,
    },
    /// An order report.
    OrderReport {
        /// Destination topic.
        topic: String,
        /// The message.
        report: OrderReport,
    },
}

impl OutboundMessage {
    /// Returns the destination queue or topic.
    #[must_use]
    pub fn destination(&self) -> &str {
        match self {
            Self::Step { queue, .. } => queue,
            Self::OrderReport { topic, .. } => topic,
        }
    }
}

/// Publisher that forwards every message into an in-process channel.
///
/// A bridge task owning the receiver relays messages to the real broker, or
/// a test drives the services directly from it.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelPublisher {
    /// Creates the publisher and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, message: OutboundMessage) -> Result<(), PublishError> {
        let destination = message.destination().to_string();
        debug!(destination = %destination, "Publishing message");
        self.sender
            .send(message)
            .map_err(|_| PublishError::closed(destination))
    }
}

#[async_trait]
impl MessagePublisher for ChannelPublisher {
    async fn publish_step(&self, queue: &str, description: StepDescription) -> Result<(), PublishError> {
        self.send(OutboundMessage::Step {
            queue: queue.to_string(),
            description,
        })
    }

    async fn publish_order_report(&self, topic: &str, report: OrderReport) -> Result<(), PublishError> {
        self.send(OutboundMessage::OrderReport {
            topic: topic.to_string(),
            report,
        })
    }
}

/// Publisher writing each message as one JSON line to a byte sink.
///
/// Used to bridge the orchestrator to an external relay over stdout or a
/// socket. Writes are serialized, so lines never interleave.
#[derive(Debug)]
pub struct JsonLinesPublisher<W> {
    writer: AsyncMutex<W>,
}

impl<W> JsonLinesPublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps a writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: AsyncMutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_line(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        let destination = message.destination();
        let mut line =
            serde_json::to_vec(message).map_err(|e| PublishError::encoding(destination, e.to_string()))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|_| PublishError::closed(destination))?;
        writer.flush().await.map_err(|_| PublishError::closed(destination))
    }
}

#[async_trait]
impl<W> MessagePublisher for JsonLinesPublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish_step(&self, queue: &str, description: StepDescription) -> Result<(), PublishError> {
        self.write_line(&OutboundMessage::Step {
            queue: queue.to_string(),
            description,
        })
        .await
    }

    async fn publish_order_report(&self, topic: &str, report: OrderReport) -> Result<(), PublishError> {
        self.write_line(&OutboundMessage::OrderReport {
            topic: topic.to_string(),
            report,
        })
        .await
    }
}
