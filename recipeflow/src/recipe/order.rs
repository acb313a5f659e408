//! Orders accepted from the outside.

use serde::{Deserialize, Serialize};

use crate::cache::TestingContext;
use crate::core::{Goal, LinkBundle, Mode};
use crate::messages::{OrderId, OrderOptions};

/// A user request naming the goal it wants reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Identifier the originator correlates the final report with.
    pub order_id: OrderId,
    /// Application tag.
    pub tag: String,
    /// The goal to reach.
    pub goal: Goal,
    /// Explicit mode; chosen automatically when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Links the originator already has.
    #[serde(default)]
    pub source: LinkBundle,
    /// Options forwarded to the steps.
    #[serde(default)]
    pub options: OrderOptions,
    /// Labels describing the partial scope the order is for.
    #[serde(default, skip_serializing_if = "TestingContext::is_empty")]
    pub testing_context: TestingContext,
    /// Whether produced artifacts should be retained long term.
    #[serde(default)]
    pub long_term_use: bool,
}

impl Order {
    /// Creates an order with no initial links and default options.
    #[must_use]
    pub fn new(order_id: impl Into<String>, tag: impl Into<String>, goal: Goal) -> Self {
        Self {
            order_id: OrderId::new(order_id),
            tag: tag.into(),
            goal,
            mode: None,
            source: LinkBundle::new(),
            options: OrderOptions::default(),
            testing_context: TestingContext::new(),
            long_term_use: false,
        }
    }

    /// Sets the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the initial links.
    #[must_use]
    pub fn with_source(mut self, source: LinkBundle) -> Self {
        self.source = source;
        self
    }

    /// Sets the step options.
    #[must_use]
    pub fn with_options(mut self, options: OrderOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a testing context label.
    #[must_use]
    pub fn with_context_label(mut self, label: impl Into<String>) -> Self {
        self.testing_context.insert(label.into());
        self
    }

    /// Marks the produced artifacts for long-term retention.
    #[must_use]
    pub fn with_long_term_use(mut self, long_term_use: bool) -> Self {
        self.long_term_use = long_term_use;
        self
    }
}
