//! Fixtures standing in for the transformation services.

use std::collections::BTreeMap;

use crate::core::{Goal, LinkBundle, LinkField};
use crate::messages::{ErrorKind, OutboundMessage, QueueRouting, StepDescription, StepReport};

/// Answers step descriptions the way the transformation services would.
///
/// By default every step succeeds and fills in the link its goal produces,
/// as `"<service>/<taskId>"`. Individual goals can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct StageSimulator {
    routing: QueueRouting,
    failures: BTreeMap<Goal, (ErrorKind, String)>,
}

impl StageSimulator {
    /// Creates a simulator for services listening on `routing`'s queues.
    #[must_use]
    pub fn new(routing: QueueRouting) -> Self {
        Self {
            routing,
            failures: BTreeMap::new(),
        }
    }

    /// Makes every step for `goal` fail.
    #[must_use]
    pub fn failing_at(mut self, goal: Goal, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.failures.insert(goal, (kind, message.into()));
        self
    }

    /// Returns the goal whose service listens on `queue`.
    #[must_use]
    pub fn goal_for_queue(&self, queue: &str) -> Option<Goal> {
        Goal::ALL
            .into_iter()
            .find(|goal| self.routing.step_queue(*goal) == queue)
    }

    /// Returns the link a successful step would report.
    #[must_use]
    pub fn produced_link(goal: Goal, description: &StepDescription) -> String {
        format!("{}/{}", goal.service(), description.task_id)
    }

    /// Answers one step published to `queue`.
    #[must_use]
    pub fn answer(&self, queue: &str, description: &StepDescription) -> Option<StepReport> {
        let goal = self.goal_for_queue(queue)?;
        let task_id = description.task_id.clone();

        if let Some((kind, message)) = self.failures.get(&goal) {
            return Some(StepReport::failure(task_id, kind.clone(), message.clone()));
        }

        let delta = LinkBundle::new().with(goal.produces(), Self::produced_link(goal, description));
        Some(StepReport::success(task_id, delta))
    }

    /// Answers an outbound message; order reports get no answer.
    #[must_use]
    pub fn answer_message(&self, message: &OutboundMessage) -> Option<StepReport> {
        match message {
            OutboundMessage::Step { queue, description } => self.answer(queue, description),
            OutboundMessage::OrderReport { .. } => None,
        }
    }
}

/// A bundle holding only measurement data, the usual input of a
/// from-past-requests order.
#[must_use]
pub fn measurement_source(link: &str) -> LinkBundle {
    LinkBundle::new().with(LinkField::MeasurementData, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{RecipeId, StepOptions, TaskId};

    fn description() -> StepDescription {
        StepDescription {
            task_id: TaskId::new(RecipeId::new("r"), 1),
            tag: "shop".to_string(),
            source: LinkBundle::new(),
            options: StepOptions::default(),
            long_term_use: false,
        }
    }

    #[test]
    fn test_success_fills_produced_link() {
        let routing = QueueRouting::default();
        let simulator = StageSimulator::new(routing.clone());

        let report = simulator
            .answer(&routing.step_queue(Goal::BuildWorkloadModel), &description())
            .unwrap();

        assert!(report.successful);
        assert_eq!(
            report.result.unwrap().get(LinkField::WorkloadModel),
            Some("workload-model/r.1")
        );
    }

    #[test]
    fn test_configured_failure() {
        let routing = QueueRouting::default();
        let simulator = StageSimulator::new(routing.clone()).failing_at(
            Goal::BuildLoadTest,
            ErrorKind::ServiceFailure,
            "generator crashed",
        );

        let report = simulator
            .answer(&routing.step_queue(Goal::BuildLoadTest), &description())
            .unwrap();
        assert!(!report.successful);
        assert_eq!(report.error_or_unknown().to_string(), "service-failure: generator crashed");
    }

    #[test]
    fn test_unknown_queue() {
        let simulator = StageSimulator::default();
        assert!(simulator.answer("elsewhere", &description()).is_none());
    }
}
