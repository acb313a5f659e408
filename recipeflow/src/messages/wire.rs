//! Messages exchanged with the transformation services and the order
//! originator. All of them serialize to camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{OrderId, TaskId};
use crate::core::{Goal, LinkBundle, LoadTestKind, WorkloadModelKind};

/// Parameters for the forecast service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastOptions {
    /// How far to forecast, in seconds.
    pub horizon_seconds: u64,
    /// Resolution of the forecast, in seconds.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Aggregation applied to the historic intensities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

fn default_interval_seconds() -> u64 {
    60
}

/// Parameters for load test generation and execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestOptions {
    /// Number of concurrent virtual users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_users: Option<u32>,
    /// Test duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    /// Ramp-up time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rampup_seconds: Option<u64>,
}

/// Options an order carries for all of its steps.
///
/// Each step only receives the subset relevant to its goal, see
/// [`OrderOptions::for_goal`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOptions {
    /// Forecast parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastOptions>,
    /// Load test parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test: Option<LoadTestOptions>,
    /// Requested workload model kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_model_type: Option<WorkloadModelKind>,
    /// Requested load test kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test_type: Option<LoadTestKind>,
    /// Sub-services to restrict a modular build to. Empty means the whole
    /// application.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_services: Vec<String>,
}

impl OrderOptions {
    /// Returns the options a step for `goal` needs.
    #[must_use]
    pub fn for_goal(&self, goal: Goal) -> StepOptions {
        let mut step = StepOptions::default();
        match goal {
            Goal::ExtractSessions | Goal::BuildBehaviorMix => {
                step.target_services.clone_from(&self.target_services);
            }
            Goal::BuildWorkloadModel => {
                step.workload_model_type = self.workload_model_type;
                step.target_services.clone_from(&self.target_services);
            }
            Goal::BuildLoadTest => {
                step.load_test_type = self.load_test_type;
                step.load_test.clone_from(&self.load_test);
                step.target_services.clone_from(&self.target_services);
            }
            Goal::ExecuteLoadTest => {
                step.load_test_type = self.load_test_type;
                step.load_test.clone_from(&self.load_test);
            }
            Goal::Forecast => {
                step.forecast.clone_from(&self.forecast);
            }
        }
        step
    }
}

/// Goal-specific options attached to one step description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOptions {
    /// Forecast parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastOptions>,
    /// Load test parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test: Option<LoadTestOptions>,
    /// Workload model kind to build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_model_type: Option<WorkloadModelKind>,
    /// Load test kind to build or run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test_type: Option<LoadTestKind>,
    /// Sub-services for a modular build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_services: Vec<String>,
}

/// Instruction sent to the service owning a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDescription {
    /// Correlation key the service must echo back in its report.
    pub task_id: TaskId,
    /// Application tag the order targets.
    pub tag: String,
    /// Every link accumulated by the recipe so far.
    pub source: LinkBundle,
    /// Goal-specific options.
    #[serde(default)]
    pub options: StepOptions,
    /// Whether the produced artifacts should be retained long term.
    #[serde(default)]
    pub long_term_use: bool,
}

/// Category of a stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The step input was unusable.
    InvalidInput,
    /// A required upstream artifact could not be found.
    NotFound,
    /// The service failed while processing the step.
    ServiceFailure,
    /// No report arrived before the task deadline.
    Timeout,
    /// The order was cancelled.
    Cancelled,
    /// The step could not be handed to the transport.
    DispatchFailed,
    /// A kind this crate does not know; kept verbatim.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => f.write_str("invalid-input"),
            Self::NotFound => f.write_str("not-found"),
            Self::ServiceFailure => f.write_str("service-failure"),
            Self::Timeout => f.write_str("timeout"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::DispatchFailed => f.write_str("dispatch-failed"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// Error carried by a failed step report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ReportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Completion report a service sends back for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    /// Correlation key from the step description.
    pub task_id: TaskId,
    /// Whether the step succeeded.
    pub successful: bool,
    /// Links produced by the step, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LinkBundle>,
    /// Failure detail, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
}

impl StepReport {
    /// Creates a success report carrying a link delta.
    #[must_use]
    pub fn success(task_id: TaskId, result: LinkBundle) -> Self {
        Self {
            task_id,
            successful: true,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failure report.
    #[must_use]
    pub fn failure(task_id: TaskId, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            task_id,
            successful: false,
            result: None,
            error: Some(ReportedError {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Returns the failure detail, synthesizing one when a failed report
    /// omitted it.
    #[must_use]
    pub fn error_or_unknown(&self) -> ReportedError {
        self.error.clone().unwrap_or_else(|| ReportedError {
            kind: ErrorKind::Other("unknown".to_string()),
            message: String::new(),
        })
    }
}

/// Terminal outcome of an order, sent once to its originator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReport {
    /// The order this report finishes.
    pub order_id: OrderId,
    /// Whether every step succeeded.
    pub successful: bool,
    /// Links accumulated by the recipe. On failure, whatever was produced
    /// before the failing step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<LinkBundle>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the order finished.
    pub finished_at: DateTime<Utc>,
}

impl OrderReport {
    /// Creates a success report.
    #[must_use]
    pub fn success(order_id: OrderId, artifacts: LinkBundle) -> Self {
        Self {
            order_id,
            successful: true,
            artifacts: Some(artifacts),
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// Creates an error report.
    #[must_use]
    pub fn error(order_id: OrderId, artifacts: Option<LinkBundle>, error: impl Into<String>) -> Self {
        Self {
            order_id,
            successful: false,
            artifacts,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }
}
