//! Order intake and the step-report state machine.
//!
//! This module provides:
//! - Mode selection and cycle planning for incoming orders
//! - The `Orchestrator`, which dispatches tasks and handles step reports
//! - Per-task deadlines and the watchdog that expires them
//! - `InboundMessage`, the JSON envelope of orders, reports and cancellations
//!
//! Live recipes exist only in memory. After a restart the originator is
//! expected to submit unfinished orders again; they start over from the
//! first step not already satisfied by the artifact cache.

mod deadlines;
mod handler;
mod inbound;
pub mod intake;

pub use deadlines::DeadlineTracker;
pub use handler::{DropReason, Orchestrator, ReportOutcome, SubmitOutcome};
pub use inbound::InboundMessage;
pub use intake::Plan;
