//! One dispatchable step of a recipe.

use tracing::debug;

use crate::core::{Goal, LinkBundle};
use crate::errors::PublishError;
use crate::messages::{MessagePublisher, QueueRouting, StepDescription, StepOptions, TaskId};

/// A single pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    goal: Goal,
    tag: String,
    options: StepOptions,
    long_term_use: bool,
}

impl Task {
    /// Creates a task.
    #[must_use]
    pub fn new(id: TaskId, goal: Goal, tag: impl Into<String>, options: StepOptions, long_term_use: bool) -> Self {
        Self {
            id,
            goal,
            tag: tag.into(),
            options,
            long_term_use,
        }
    }

    /// Returns the correlation key.
    #[must_use]
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the goal this step reaches.
    #[must_use]
    pub fn goal(&self) -> Goal {
        self.goal
    }

    /// Returns the step options.
    #[must_use]
    pub fn options(&self) -> &StepOptions {
        &self.options
    }

    /// Builds the step description with `source` as input.
    #[must_use]
    pub fn describe(&self, source: LinkBundle) -> StepDescription {
        StepDescription {
            task_id: self.id.clone(),
            tag: self.tag.clone(),
            source,
            options: self.options.clone(),
            long_term_use: self.long_term_use,
        }
    }

    /// Publishes the step to the queue of the goal's service.
    ///
    /// Returns as soon as the transport accepted the message; the outcome
    /// arrives later as a step report.
    pub async fn execute(
        &self,
        source: LinkBundle,
        publisher: &dyn MessagePublisher,
        routing: &QueueRouting,
    ) -> Result<(), PublishError> {
        let queue = routing.step_queue(self.goal);
        debug!(task_id = %self.id, goal = %self.goal, queue = %queue, "Dispatching task");
        publisher.publish_step(&queue, self.describe(source)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LinkField;
    use crate::messages::{OutboundMessage, RecipeId};
    use crate::testing::CollectingPublisher;

    #[tokio::test]
    async fn test_execute_publishes_to_goal_queue() {
        let publisher = CollectingPublisher::new();
        let routing = QueueRouting::new("lt", "lt.done");
        let task = Task::new(
            TaskId::new(RecipeId::new("r"), 3),
            Goal::BuildLoadTest,
            "shop",
            StepOptions::default(),
            true,
        );
        let source = LinkBundle::new().with(LinkField::WorkloadModel, "wm/1");

        task.execute(source.clone(), &publisher, &routing).await.unwrap();

        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            OutboundMessage::Step { queue, description } => {
                assert_eq!(queue, "lt.load-test.tasks");
                assert_eq!(description.task_id.to_string(), "r.3");
                assert_eq!(description.tag, "shop");
                assert_eq!(description.source, source);
                assert!(description.long_term_use);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
