//! Error types for the recipeflow orchestration core.
//!
//! Stage failures reported by the transformation services are *not* errors of
//! this crate: they travel as data inside a `StepReport` and end up in the
//! `OrderReport`. The types here cover misuse of the core itself, broken
//! cycle registrations, transport and cache I/O failures.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::core::{Goal, Mode};

/// The main error type for recipeflow operations.
#[derive(Debug, Error)]
pub enum RecipeflowError {
    /// The cycle registrations violate an invariant.
    #[error("{0}")]
    Registry(#[from] RegistryValidationError),

    /// No registered cycle reaches the requested goal.
    #[error("{0}")]
    NoCycle(#[from] NoCycleError),

    /// Publishing a message to the transport failed.
    #[error("{0}")]
    Publish(#[from] PublishError),

    /// The testing-context cache failed.
    #[error("{0}")]
    Cache(#[from] CacheError),

    /// A wire value could not be parsed.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Metadata about a registry violation for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViolationInfo {
    /// Violation code (e.g., "REGISTRY-DUPLICATE-GOAL").
    pub code: String,
    /// Short summary of the violation.
    pub summary: String,
    /// Hint for fixing the registration.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ViolationInfo {
    /// Creates new violation info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when the startup validation of the cycle registry fails.
///
/// All violations found in one pass are collected so the operator sees the
/// whole picture at once.
#[derive(Debug, Clone, Error)]
#[error("Cycle registry is invalid: {}", violations.iter().map(|v| v.summary.as_str()).collect::<Vec<_>>().join("; "))]
pub struct RegistryValidationError {
    /// The violations found.
    pub violations: Vec<ViolationInfo>,
}

impl RegistryValidationError {
    /// Creates a validation error from a list of violations.
    #[must_use]
    pub fn new(violations: Vec<ViolationInfo>) -> Self {
        Self { violations }
    }

    /// Returns the violation codes, in discovery order.
    #[must_use]
    pub fn codes(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.code.as_str()).collect()
    }
}

/// Error raised when an order names a goal no cycle of the mode reaches.
#[derive(Debug, Clone, Error)]
#[error("No cycle reaches goal '{goal}'{}", mode.map(|m| format!(" in mode '{m}'")).unwrap_or_default())]
pub struct NoCycleError {
    /// The requested goal.
    pub goal: Goal,
    /// The requested mode, if any was given.
    pub mode: Option<Mode>,
}

impl NoCycleError {
    /// Creates a new error.
    #[must_use]
    pub fn new(goal: Goal, mode: Option<Mode>) -> Self {
        Self { goal, mode }
    }
}

/// Errors raised by a `MessagePublisher`.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The destination is closed (the receiving side was dropped).
    #[error("Destination closed: {destination}")]
    Closed {
        /// Queue or topic name.
        destination: String,
    },

    /// The message could not be encoded.
    #[error("Encoding failed for {destination}: {reason}")]
    Encoding {
        /// Queue or topic name.
        destination: String,
        /// Encoder message.
        reason: String,
    },
}

impl PublishError {
    /// Creates a closed-destination error.
    #[must_use]
    pub fn closed(destination: impl Into<String>) -> Self {
        Self::Closed {
            destination: destination.into(),
        }
    }

    /// Creates an encoding error.
    #[must_use]
    pub fn encoding(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encoding {
            destination: destination.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the testing-context artifact cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying storage I/O failed.
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stored document could not be decoded or encoded.
    #[error("Cache serialization error at {path}: {reason}")]
    Serialization {
        /// Path being accessed.
        path: String,
        /// Decoder message.
        reason: String,
    },

    /// A tag cannot be used as a storage key.
    #[error("Invalid cache tag '{0}'")]
    InvalidTag(String),
}

impl CacheError {
    /// Creates an I/O error.
    #[must_use]
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Serialization {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for recipeflow operations.
pub type Result<T, E = RecipeflowError> = std::result::Result<T, E>;
