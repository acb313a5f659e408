//! Link bundle: the accumulating set of produced-artifact locators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Names one link slot of a [`LinkBundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkField {
    /// Raw measurement data (request logs, traces export).
    MeasurementData,
    /// Extracted session logs.
    SessionLogs,
    /// Behavior mix derived from sessions.
    BehaviorModel,
    /// Inferred workload model.
    WorkloadModel,
    /// Generated load test script.
    LoadTest,
    /// Report of an executed load test.
    LoadTestReport,
    /// Workload forecast.
    Forecast,
    /// Trace data.
    Trace,
}

impl LinkField {
    /// All link fields.
    pub const ALL: [Self; 8] = [
        Self::MeasurementData,
        Self::SessionLogs,
        Self::BehaviorModel,
        Self::WorkloadModel,
        Self::LoadTest,
        Self::LoadTestReport,
        Self::Forecast,
        Self::Trace,
    ];

    /// Fields compared when deciding whether two bundles describe the same
    /// underlying computation.
    pub const PRIMARY: [Self; 4] = [
        Self::MeasurementData,
        Self::SessionLogs,
        Self::WorkloadModel,
        Self::LoadTest,
    ];
}

impl fmt::Display for LinkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MeasurementData => "measurement-data",
            Self::SessionLogs => "session-logs",
            Self::BehaviorModel => "behavior-model",
            Self::WorkloadModel => "workload-model",
            Self::LoadTest => "load-test",
            Self::LoadTestReport => "load-test-report",
            Self::Forecast => "forecast",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Discriminates the workload model behind `workloadModelLink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadModelKind {
    /// Session-based Markov model.
    Wessbas,
    /// Plain per-endpoint request rates.
    RequestRates,
}

/// Discriminates the load test behind `loadTestLink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadTestKind {
    /// Apache JMeter test plan.
    Jmeter,
    /// BenchFlow test definition.
    Benchflow,
}

/// A set of optional, independently settable links to produced artifacts.
///
/// Bundles only ever grow: [`LinkBundle::merge_from`] fills absent fields and
/// never overwrites a field that is already set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBundle {
    /// Raw measurement data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_data_link: Option<String>,
    /// Extracted session logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_logs_link: Option<String>,
    /// Behavior mix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_model_link: Option<String>,
    /// Workload model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_model_link: Option<String>,
    /// Kind of the workload model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_model_type: Option<WorkloadModelKind>,
    /// Load test script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test_link: Option<String>,
    /// Kind of the load test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test_type: Option<LoadTestKind>,
    /// Load test execution report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test_report_link: Option<String>,
    /// Workload forecast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_link: Option<String>,
    /// Trace data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_link: Option<String>,
}

impl LinkBundle {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a link, builder style.
    #[must_use]
    pub fn with(mut self, field: LinkField, link: impl Into<String>) -> Self {
        *self.slot_mut(field) = Some(link.into());
        self
    }

    /// Sets the workload model link and its kind.
    #[must_use]
    pub fn with_workload_model(mut self, link: impl Into<String>, kind: WorkloadModelKind) -> Self {
        self.workload_model_link = Some(link.into());
        self.workload_model_type = Some(kind);
        self
    }

    /// Sets the load test link and its kind.
    #[must_use]
    pub fn with_load_test(mut self, link: impl Into<String>, kind: LoadTestKind) -> Self {
        self.load_test_link = Some(link.into());
        self.load_test_type = Some(kind);
        self
    }

    /// Returns the link stored for a field.
    #[must_use]
    pub fn get(&self, field: LinkField) -> Option<&str> {
        match field {
            LinkField::MeasurementData => self.measurement_data_link.as_deref(),
            LinkField::SessionLogs => self.session_logs_link.as_deref(),
            LinkField::BehaviorModel => self.behavior_model_link.as_deref(),
            LinkField::WorkloadModel => self.workload_model_link.as_deref(),
            LinkField::LoadTest => self.load_test_link.as_deref(),
            LinkField::LoadTestReport => self.load_test_report_link.as_deref(),
            LinkField::Forecast => self.forecast_link.as_deref(),
            LinkField::Trace => self.trace_link.as_deref(),
        }
    }

    fn slot_mut(&mut self, field: LinkField) -> &mut Option<String> {
        match field {
            LinkField::MeasurementData => &mut self.measurement_data_link,
            LinkField::SessionLogs => &mut self.session_logs_link,
            LinkField::BehaviorModel => &mut self.behavior_model_link,
            LinkField::WorkloadModel => &mut self.workload_model_link,
            LinkField::LoadTest => &mut self.load_test_link,
            LinkField::LoadTestReport => &mut self.load_test_report_link,
            LinkField::Forecast => &mut self.forecast_link,
            LinkField::Trace => &mut self.trace_link,
        }
    }

    /// Returns true if the field is set.
    #[must_use]
    pub fn has(&self, field: LinkField) -> bool {
        self.get(field).is_some()
    }

    /// Returns the fields that are set.
    #[must_use]
    pub fn present_fields(&self) -> Vec<LinkField> {
        LinkField::ALL.into_iter().filter(|f| self.has(*f)).collect()
    }

    /// Returns true if no link is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        LinkField::ALL.iter().all(|f| !self.has(*f))
    }

    /// Fills every absent field of `self` from `other`.
    ///
    /// Type discriminators are filled together with their link only when
    /// the link itself was taken from `other`, or when `self` has none.
    pub fn merge_from(&mut self, other: &Self) {
        let took_workload_model = self.workload_model_link.is_none() && other.workload_model_link.is_some();
        let took_load_test = self.load_test_link.is_none() && other.load_test_link.is_some();

        for field in LinkField::ALL {
            let slot = self.slot_mut(field);
            if slot.is_none() {
                if let Some(link) = other.get(field) {
                    *slot = Some(link.to_string());
                }
            }
        }

        if took_workload_model || self.workload_model_type.is_none() {
            self.workload_model_type = other.workload_model_type.or(self.workload_model_type);
        }
        if took_load_test || self.load_test_type.is_none() {
            self.load_test_type = other.load_test_type.or(self.load_test_type);
        }
    }

    /// Returns the field-wise union of `self` and `other`, `self` winning.
    #[must_use]
    pub fn merged(mut self, other: &Self) -> Self {
        self.merge_from(other);
        self
    }

    /// Returns true if at least one primary field is set and equal in both.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        LinkField::PRIMARY
            .iter()
            .any(|f| matches!((self.get(*f), other.get(*f)), (Some(a), Some(b)) if a == b))
    }

    /// Returns a copy holding only `fields`. A kind is kept with its link.
    #[must_use]
    pub fn restricted_to(&self, fields: &[LinkField]) -> Self {
        let mut restricted = Self::new();
        for field in fields {
            *restricted.slot_mut(*field) = self.get(*field).map(str::to_string);
        }
        if restricted.workload_model_link.is_some() {
            restricted.workload_model_type = self.workload_model_type;
        }
        if restricted.load_test_link.is_some() {
            restricted.load_test_type = self.load_test_type;
        }
        restricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_fills_gaps_and_existing_wins() {
        let mut base = LinkBundle::new()
            .with(LinkField::SessionLogs, "sessions/1")
            .with(LinkField::Forecast, "forecast/old");
        let delta = LinkBundle::new()
            .with(LinkField::Forecast, "forecast/new")
            .with(LinkField::LoadTest, "load-test/7");

        base.merge_from(&delta);

        assert_eq!(base.get(LinkField::SessionLogs), Some("sessions/1"));
        assert_eq!(base.get(LinkField::Forecast), Some("forecast/old"));
        assert_eq!(base.get(LinkField::LoadTest), Some("load-test/7"));
    }

    #[test]
    fn test_merge_never_clears() {
        let mut base = LinkBundle::new().with(LinkField::Trace, "trace/1");
        base.merge_from(&LinkBundle::new());
        assert_eq!(base.get(LinkField::Trace), Some("trace/1"));
    }

    #[test]
    fn test_merge_carries_kind_with_link() {
        let mut base = LinkBundle::new();
        let delta = LinkBundle::new().with_workload_model("wm/1", WorkloadModelKind::Wessbas);
        base.merge_from(&delta);
        assert_eq!(base.workload_model_type, Some(WorkloadModelKind::Wessbas));

        let mut base = LinkBundle::new().with_load_test("lt/1", LoadTestKind::Jmeter);
        let delta = LinkBundle::new().with_load_test("lt/2", LoadTestKind::Benchflow);
        base.merge_from(&delta);
        assert_eq!(base.load_test_link.as_deref(), Some("lt/1"));
        assert_eq!(base.load_test_type, Some(LoadTestKind::Jmeter));
    }

    #[test]
    fn test_overlap_requires_equal_primary_field() {
        let a = LinkBundle::new()
            .with(LinkField::SessionLogs, "s/1")
            .with(LinkField::Forecast, "f/1");
        let b = LinkBundle::new().with(LinkField::SessionLogs, "s/1");
        let c = LinkBundle::new().with(LinkField::SessionLogs, "s/2");
        let d = LinkBundle::new().with(LinkField::Forecast, "f/1");

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        // forecast is not a primary field
        assert!(!a.overlaps(&d));
        assert!(!LinkBundle::new().overlaps(&LinkBundle::new()));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let bundle = LinkBundle::new()
            .with(LinkField::MeasurementData, "md/1")
            .with_workload_model("wm/1", WorkloadModelKind::RequestRates);
        let json = serde_json::to_value(&bundle).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "measurementDataLink": "md/1",
                "workloadModelLink": "wm/1",
                "workloadModelType": "request-rates",
            })
        );
    }

    #[test]
    fn test_present_fields() {
        let bundle = LinkBundle::new()
            .with(LinkField::Trace, "t")
            .with(LinkField::MeasurementData, "m");
        assert_eq!(
            bundle.present_fields(),
            vec![LinkField::MeasurementData, LinkField::Trace]
        );
        assert!(!bundle.is_empty());
        assert!(LinkBundle::new().is_empty());
    }

    #[test]
    fn test_restricted_to_keeps_kind_with_link() {
        let bundle = LinkBundle::new()
            .with(LinkField::SessionLogs, "s/1")
            .with_workload_model("wm/1", WorkloadModelKind::Wessbas)
            .with_load_test("lt/1", LoadTestKind::Jmeter);

        let restricted = bundle.restricted_to(&[LinkField::SessionLogs, LinkField::WorkloadModel]);
        assert_eq!(
            restricted,
            LinkBundle::new()
                .with(LinkField::SessionLogs, "s/1")
                .with_workload_model("wm/1", WorkloadModelKind::Wessbas)
        );
        assert!(bundle.restricted_to(&[]).is_empty());
    }
}
