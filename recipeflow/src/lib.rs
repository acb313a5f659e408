//! # Recipeflow
//!
//! Orchestration core of a load-test generation pipeline.
//!
//! Independent services turn recorded traffic into executable load tests,
//! one transformation at a time. Recipeflow decides which ordered sequence of
//! those transformations an order needs and drives it to completion:
//!
//! - **Cycles**: legal goal sequences per usage mode
//! - **Recipes**: one per order; a task list, a cursor and the links
//!   produced so far
//! - **Orchestrator**: dispatches each task to its service and advances the
//!   recipe on every step report, aborting on the first failure
//! - **Artifact cache**: merges and reuses artifacts produced for
//!   overlapping testing contexts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recipeflow::prelude::*;
//!
//! let (publisher, outbound) = ChannelPublisher::new();
//! let orchestrator = Arc::new(Orchestrator::from_config(
//!     &OrchestratorConfig::default(),
//!     CycleRegistry::standard(),
//!     Arc::new(publisher),
//! )?);
//!
//! let order = Order::new("order-1", "shop", Goal::BuildLoadTest)
//!     .with_source(LinkBundle::new().with(LinkField::MeasurementData, "s3://traces/1"));
//! orchestrator.submit_order(order).await?;
//!
//! // Feed step reports from the broker.
//! orchestrator.clone().run(reports).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod config;
pub mod core;
pub mod cycles;
pub mod errors;
pub mod events;
pub mod messages;
pub mod observability;
pub mod orchestrator;
pub mod recipe;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::cache::{
        ArtifactBackend, ArtifactId, FileArtifactStore, InMemoryArtifactStore, TestingContext,
        TestingContextCache, WriteToken,
    };
    pub use crate::config::OrchestratorConfig;
    pub use crate::core::{Goal, LinkBundle, LinkField, LoadTestKind, Mode, WorkloadModelKind};
    pub use crate::cycles::{Cycle, CycleRegistry};
    pub use crate::errors::{CacheError, PublishError, RecipeflowError, RegistryValidationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::messages::{
        ChannelPublisher, ErrorKind, MessagePublisher, OrderId, OrderReport, OutboundMessage, QueueRouting,
        RecipeId, StepDescription, StepReport, TaskId,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::orchestrator::{Orchestrator, ReportOutcome, SubmitOutcome};
    pub use crate::recipe::{Order, Recipe, RecipeStatus};
}
