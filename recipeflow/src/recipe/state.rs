//! Recipe: the live execution of a cycle prefix for one order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::Order;
use super::task::Task;
use crate::cache::TestingContext;
use crate::core::{Goal, LinkBundle};
use crate::messages::{OrderId, RecipeId, TaskId};

/// Lifecycle status of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    /// Built but no task dispatched yet.
    Created,
    /// A task is outstanding.
    Running,
    /// Every task succeeded.
    Succeeded,
    /// A task failed, timed out, or the order was cancelled.
    Failed,
}

impl RecipeStatus {
    /// Returns true if the recipe can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for RecipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// An ordered task list, a cursor, and the links accumulated so far.
///
/// The cursor only moves forward and the accumulated bundle only grows. Every
/// dispatched task receives the union of all previous steps' outputs.
#[derive(Debug, Clone)]
pub struct Recipe {
    id: RecipeId,
    order_id: OrderId,
    tag: String,
    tasks: Vec<Task>,
    cursor: usize,
    source: LinkBundle,
    testing_context: TestingContext,
    status: RecipeStatus,
    created_at: DateTime<Utc>,
}

impl Recipe {
    /// Builds one task per goal of `goals`, in order.
    #[must_use]
    pub fn new(id: RecipeId, order: &Order, goals: &[Goal], source: LinkBundle) -> Self {
        let tasks = goals
            .iter()
            .enumerate()
            .map(|(index, goal)| {
                Task::new(
                    TaskId::new(id.clone(), index),
                    *goal,
                    order.tag.clone(),
                    order.options.for_goal(*goal),
                    order.long_term_use,
                )
            })
            .collect();

        Self {
            id,
            order_id: order.order_id.clone(),
            tag: order.tag.clone(),
            tasks,
            cursor: 0,
            source,
            testing_context: order.testing_context.clone(),
            status: RecipeStatus::Created,
            created_at: Utc::now(),
        }
    }

    /// Returns the recipe id.
    #[must_use]
    pub fn id(&self) -> &RecipeId {
        &self.id
    }

    /// Returns the id of the order this recipe serves.
    #[must_use]
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Returns the application tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the testing context of the order.
    #[must_use]
    pub fn testing_context(&self) -> &TestingContext {
        &self.testing_context
    }

    /// Returns the accumulated links.
    #[must_use]
    pub fn source(&self) -> &LinkBundle {
        &self.source
    }

    /// Returns the goals of all tasks, in order.
    #[must_use]
    pub fn goals(&self) -> Vec<Goal> {
        self.tasks.iter().map(Task::goal).collect()
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the recipe has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> RecipeStatus {
        self.status
    }

    /// Returns when the recipe was built.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true while tasks remain to be dispatched.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.cursor < self.tasks.len()
    }

    /// Returns the task at the cursor and advances the cursor.
    ///
    /// Returns `None` once the task list is exhausted or the recipe is
    /// terminal; callers are expected to check [`Recipe::has_next`] first.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Task> {
        if self.status.is_terminal() {
            return None;
        }
        let task = self.tasks.get(self.cursor)?.clone();
        self.cursor += 1;
        self.status = RecipeStatus::Running;
        Some(task)
    }

    /// Returns the id of the task dispatched last, if any.
    #[must_use]
    pub fn outstanding(&self) -> Option<&TaskId> {
        if self.status != RecipeStatus::Running {
            return None;
        }
        self.cursor.checked_sub(1).map(|idx| self.tasks[idx].id())
    }

    /// Returns true if `task_id` is the task the recipe is waiting for.
    #[must_use]
    pub fn is_outstanding(&self, task_id: &TaskId) -> bool {
        self.outstanding() == Some(task_id)
    }

    /// Merges a step's link delta into the accumulated bundle.
    pub fn apply_report(&mut self, delta: &LinkBundle) {
        self.source.merge_from(delta);
    }

    /// Marks the recipe as succeeded.
    pub fn complete(&mut self) {
        self.status = RecipeStatus::Succeeded;
    }

    /// Marks the recipe as failed.
    pub fn fail(&mut self) {
        self.status = RecipeStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LinkField;
    use pretty_assertions::assert_eq;

    fn three_step_recipe() -> Recipe {
        let order = Order::new("o-1", "shop", Goal::BuildLoadTest);
        Recipe::new(
            RecipeId::new("r-1"),
            &order,
            &[Goal::ExtractSessions, Goal::BuildWorkloadModel, Goal::BuildLoadTest],
            LinkBundle::new().with(LinkField::MeasurementData, "md/1"),
        )
    }

    #[test]
    fn test_tasks_in_cycle_order() {
        let mut recipe = three_step_recipe();
        let mut yielded = Vec::new();
        let mut has_next_count = 0;

        while recipe.has_next() {
            has_next_count += 1;
            yielded.push(recipe.next().unwrap());
        }

        assert_eq!(has_next_count, 3);
        assert!(!recipe.has_next());
        assert!(recipe.next().is_none());
        assert_eq!(
            yielded.iter().map(Task::goal).collect::<Vec<_>>(),
            vec![Goal::ExtractSessions, Goal::BuildWorkloadModel, Goal::BuildLoadTest]
        );
        assert_eq!(
            yielded.iter().map(|t| t.id().index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_accumulated_bundle_is_union_of_deltas() {
        let mut recipe = three_step_recipe();
        let deltas = [
            LinkBundle::new().with(LinkField::SessionLogs, "s/1"),
            LinkBundle::new().with(LinkField::WorkloadModel, "wm/1"),
            LinkBundle::new().with(LinkField::LoadTest, "lt/1"),
        ];

        for delta in &deltas {
            recipe.next().unwrap();
            recipe.apply_report(delta);
        }

        let expected = LinkBundle::new()
            .with(LinkField::MeasurementData, "md/1")
            .with(LinkField::SessionLogs, "s/1")
            .with(LinkField::WorkloadModel, "wm/1")
            .with(LinkField::LoadTest, "lt/1");
        assert_eq!(recipe.source(), &expected);
    }

    #[test]
    fn test_outstanding_tracks_cursor() {
        let mut recipe = three_step_recipe();
        assert_eq!(recipe.status(), RecipeStatus::Created);
        assert!(recipe.outstanding().is_none());

        let first = recipe.next().unwrap();
        assert!(recipe.is_outstanding(first.id()));

        let second = recipe.next().unwrap();
        assert!(!recipe.is_outstanding(first.id()));
        assert!(recipe.is_outstanding(second.id()));

        recipe.fail();
        assert!(recipe.status().is_terminal());
        assert!(recipe.outstanding().is_none());
        assert!(recipe.next().is_none());
    }

    #[test]
    fn test_tasks_carry_order_settings() {
        let order = Order::new("o-1", "shop", Goal::Forecast)
            .with_long_term_use(true)
            .with_context_label("cart");
        let mut recipe = Recipe::new(RecipeId::new("r"), &order, &[Goal::Forecast], LinkBundle::new());

        let task = recipe.next().unwrap();
        let description = task.describe(recipe.source().clone());
        assert!(description.long_term_use);
        assert_eq!(description.tag, "shop");
        assert_eq!(recipe.testing_context().len(), 1);
        assert_eq!(recipe.order_id().as_str(), "o-1");
    }
}
