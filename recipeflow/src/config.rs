//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::RecipeflowError;
use crate::messages::QueueRouting;
use crate::observability::LogFormat;

/// Settings of one orchestrator process.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Prefix of every step queue.
    #[serde(default = "default_queue_prefix")]
    pub queue_prefix: String,
    /// Topic order reports are published to.
    #[serde(default = "default_order_report_topic")]
    pub order_report_topic: String,
    /// Seconds a dispatched task may stay unanswered. `None` disables
    /// deadlines.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_seconds: Option<f64>,
    /// Seconds between two deadline sweeps.
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_seconds: f64,
    /// Directory of the file-backed artifact cache. `None` keeps the cache
    /// in memory.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
    /// Whether orders are answered from the cache when possible.
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_queue_prefix() -> String {
    "recipeflow".to_string()
}

fn default_order_report_topic() -> String {
    "recipeflow.order.finished".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_task_timeout() -> Option<f64> {
    Some(3600.0) // 1 hour
}

/// Upper bound for the watchdog interval: one day.
const MAX_WATCHDOG_INTERVAL_SECONDS: f64 = 86_400.0;

fn default_watchdog_interval() -> f64 {
    30.0
}

fn default_use_cache() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            queue_prefix: default_queue_prefix(),
            order_report_topic: default_order_report_topic(),
            task_timeout_seconds: default_task_timeout(),
            watchdog_interval_seconds: default_watchdog_interval(),
            cache_root: None,
            use_cache: default_use_cache(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RecipeflowError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RecipeflowError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| RecipeflowError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), RecipeflowError> {
        if self.queue_prefix.is_empty() {
            return Err(RecipeflowError::Config("queue_prefix must not be empty".into()));
        }
        if let Some(timeout) = self.task_timeout_seconds {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(RecipeflowError::Config(format!(
                    "task_timeout_seconds must be positive, got {timeout}"
                )));
            }
            Duration::try_from_secs_f64(timeout).map_err(|e| {
                RecipeflowError::Config(format!("task_timeout_seconds out of range ({timeout}): {e}"))
            })?;
        }
        let interval = self.watchdog_interval_seconds;
        if !(interval.is_finite() && interval > 0.0 && interval <= MAX_WATCHDOG_INTERVAL_SECONDS) {
            return Err(RecipeflowError::Config(format!(
                "watchdog_interval_seconds must be in (0, {MAX_WATCHDOG_INTERVAL_SECONDS}], got {interval}"
            )));
        }
        Ok(())
    }

    /// Sets the queue prefix.
    #[must_use]
    pub fn with_queue_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.queue_prefix = prefix.into();
        self
    }

    /// Sets the task timeout; `None` disables deadlines.
    #[must_use]
    pub fn with_task_timeout(mut self, seconds: Option<f64>) -> Self {
        self.task_timeout_seconds = seconds;
        self
    }

    /// Sets the file cache directory.
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Enables or disables answering orders from the cache.
    #[must_use]
    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Returns the queue routing derived from this configuration.
    #[must_use]
    pub fn routing(&self) -> QueueRouting {
        QueueRouting::new(self.queue_prefix.clone(), self.order_report_topic.clone())
    }

    /// Returns the task timeout as a `Duration`.
    #[must_use]
    ///
    /// A value that does not fit a `Duration` yields `None`; `validate`
    /// rejects such values.
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_seconds
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    /// Returns the watchdog interval as a `Duration`.
    #[must_use]
    ///
    /// Falls back to the default interval for values `validate` rejects.
    pub fn watchdog_interval(&self) -> Duration {
        let seconds = self.watchdog_interval_seconds;
        if seconds.is_finite() && seconds > 0.0 && seconds <= MAX_WATCHDOG_INTERVAL_SECONDS {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::from_secs_f64(default_watchdog_interval())
        }
    }
}
