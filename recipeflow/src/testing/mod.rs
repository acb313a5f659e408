//! Testing utilities for orchestrator users.
//!
//! This module provides:
//! - A publisher that records outbound messages
//! - A simulator answering steps like the transformation services
//! - Assertions over published order reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_order_failed, assert_order_succeeded, assert_single_order_report};
pub use fixtures::{measurement_source, StageSimulator};
pub use mocks::CollectingPublisher;
