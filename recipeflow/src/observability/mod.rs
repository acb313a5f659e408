//! Logging bootstrap.
//!
//! Library code only emits `tracing` events; a process that embeds the
//! orchestrator calls [`init_tracing`] once at startup to print them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter};

use crate::errors::RecipeflowError;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = RecipeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(RecipeflowError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Builds the filter: `RUST_LOG` when set, `default_level` otherwise.
pub fn build_filter(default_level: &str) -> Result<EnvFilter, RecipeflowError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|e| RecipeflowError::Config(format!("invalid log level '{default_level}': {e}"))),
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// # Errors
///
/// Fails if the level is not a valid filter directive or a global subscriber
/// is already installed.
pub fn init_tracing(format: LogFormat, default_level: &str) -> Result<(), RecipeflowError> {
    let filter = build_filter(default_level)?;

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                subscriber_fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_filter(filter),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                subscriber_fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .try_init(),
    };

    result.map_err(|e| RecipeflowError::Config(format!("failed to install subscriber: {e}")))
}
