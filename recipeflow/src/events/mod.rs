//! Recipe lifecycle events.
//!
//! The orchestrator reports every state change of a recipe to an
//! [`EventSink`]; the default sink writes them to the `tracing` log.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Names of the events the orchestrator emits.
pub mod event_types {
    /// A recipe was built for an order.
    pub const RECIPE_CREATED: &str = "recipe.created";
    /// A task was handed to the transport.
    pub const TASK_DISPATCHED: &str = "task.dispatched";
    /// Every task of a recipe succeeded.
    pub const RECIPE_COMPLETED: &str = "recipe.completed";
    /// A recipe was terminated by a failure, timeout or cancellation.
    pub const RECIPE_FAILED: &str = "recipe.failed";
    /// A report for an unknown, finished or non-outstanding task was dropped.
    pub const REPORT_DROPPED: &str = "report.dropped";
    /// An order was answered entirely from the artifact cache.
    pub const ORDER_SATISFIED_FROM_CACHE: &str = "order.cached";
    /// Final links of a recipe were written to the artifact cache.
    pub const CACHE_STORED: &str = "cache.stored";
}
