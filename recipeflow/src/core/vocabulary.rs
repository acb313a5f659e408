//! Goal and mode enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::links::LinkField;

/// A named pipeline stage whose output an order can ask for.
///
/// Each goal is owned by exactly one transformation service, which receives
/// the step descriptions for it on its own queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Goal {
    /// Extract user sessions from recorded measurement data.
    ExtractSessions,
    /// Derive a behavior mix from session logs.
    BuildBehaviorMix,
    /// Infer a workload model.
    BuildWorkloadModel,
    /// Generate a load test script from a workload model.
    BuildLoadTest,
    /// Execute a load test.
    ExecuteLoadTest,
    /// Forecast future workload intensity.
    Forecast,
}

impl Goal {
    /// All goals, in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::ExtractSessions,
        Self::BuildBehaviorMix,
        Self::BuildWorkloadModel,
        Self::BuildLoadTest,
        Self::ExecuteLoadTest,
        Self::Forecast,
    ];

    /// Returns the wire name of the goal.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractSessions => "extract-sessions",
            Self::BuildBehaviorMix => "build-behavior-mix",
            Self::BuildWorkloadModel => "build-workload-model",
            Self::BuildLoadTest => "build-load-test",
            Self::ExecuteLoadTest => "execute-load-test",
            Self::Forecast => "forecast",
        }
    }

    /// Returns the name of the service that owns this goal.
    #[must_use]
    pub const fn service(&self) -> &'static str {
        match self {
            Self::ExtractSessions => "session-logs",
            Self::BuildBehaviorMix => "behavior-model",
            Self::BuildWorkloadModel => "workload-model",
            Self::BuildLoadTest => "load-test",
            Self::ExecuteLoadTest => "load-test-execution",
            Self::Forecast => "forecast",
        }
    }

    /// Returns the link a successful step for this goal fills in.
    #[must_use]
    pub const fn produces(&self) -> LinkField {
        match self {
            Self::ExtractSessions => LinkField::SessionLogs,
            Self::BuildBehaviorMix => LinkField::BehaviorModel,
            Self::BuildWorkloadModel => LinkField::WorkloadModel,
            Self::BuildLoadTest => LinkField::LoadTest,
            Self::ExecuteLoadTest => LinkField::LoadTestReport,
            Self::Forecast => LinkField::Forecast,
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Goal {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownName::new("goal", s))
    }
}

/// A named usage scenario; selects which cycles are valid for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Start from raw request measurements.
    FromPastRequests,
    /// Start from already extracted sessions.
    FromPastSessions,
    /// Start from measurements and extrapolate via a forecast.
    FromForecast,
}

impl Mode {
    /// All modes, in preference order for automatic selection.
    pub const ALL: [Self; 3] = [Self::FromPastRequests, Self::FromPastSessions, Self::FromForecast];

    /// Returns the wire name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FromPastRequests => "from-past-requests",
            Self::FromPastSessions => "from-past-sessions",
            Self::FromForecast => "from-forecast",
        }
    }

    /// Returns the link an order must carry for this mode to be able to start.
    #[must_use]
    pub const fn required_input(&self) -> LinkField {
        match self {
            Self::FromPastRequests | Self::FromForecast => LinkField::MeasurementData,
            Self::FromPastSessions => LinkField::SessionLogs,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownName::new("mode", s))
    }
}

/// Error returned when parsing an unknown goal or mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: '{name}'")]
pub struct UnknownName {
    /// What was being parsed ("goal" or "mode").
    pub kind: &'static str,
    /// The offending input.
    pub name: String,
}

impl UnknownName {
    fn new(kind: &'static str, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }
}
