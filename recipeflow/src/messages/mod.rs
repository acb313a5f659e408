//! Wire messages and the publishing seam.
//!
//! This module provides:
//! - Typed identifiers (`RecipeId`, `OrderId`, `TaskId`)
//! - Step descriptions, step reports and order reports
//! - The `MessagePublisher` trait with channel and JSON-lines implementations

mod ids;
mod publisher;
mod wire;

pub use ids::{OrderId, RecipeId, TaskId};
pub use publisher::{
    ChannelPublisher, JsonLinesPublisher, MessagePublisher, OutboundMessage, QueueRouting,
};
pub use wire::{
    ErrorKind, ForecastOptions, LoadTestOptions, OrderOptions, OrderReport, ReportedError,
    StepDescription, StepOptions, StepReport,
};
