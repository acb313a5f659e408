//! Deadlines of outstanding tasks.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::messages::{RecipeId, TaskId};

/// Tracks when each dispatched task must have reported back.
///
/// A tracker without a timeout records nothing and never expires anything.
#[derive(Debug, Default)]
pub struct DeadlineTracker {
    timeout: Option<Duration>,
    deadlines: DashMap<TaskId, Instant>,
}

impl DeadlineTracker {
    /// Creates a tracker giving each task `timeout` to report.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            deadlines: DashMap::new(),
        }
    }

    /// Returns the configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Starts the clock for a task dispatched now.
    pub fn register(&self, task_id: TaskId) {
        self.register_at(task_id, Instant::now());
    }

    /// Starts the clock for a task dispatched at `dispatched_at`.
    ///
    /// A deadline too far out to represent is not recorded.
    pub fn register_at(&self, task_id: TaskId, dispatched_at: Instant) {
        let Some(timeout) = self.timeout else {
            return;
        };
        match dispatched_at.checked_add(timeout) {
            Some(deadline) => {
                self.deadlines.insert(task_id, deadline);
            }
            None => debug!(task_id = %task_id, ?timeout, "Deadline out of range, task runs without one"),
        }
    }

    /// Stops the clock for a task.
    pub fn clear(&self, task_id: &TaskId) {
        self.deadlines.remove(task_id);
    }

    /// Stops the clocks of every task of a recipe.
    pub fn clear_recipe(&self, recipe_id: &RecipeId) {
        self.deadlines.retain(|task_id, _| &task_id.recipe_id != recipe_id);
    }

    /// Returns the tasks whose deadline is at or before `now`, oldest first.
    #[must_use]
    pub fn expired(&self, now: Instant) -> Vec<TaskId> {
        let mut expired: Vec<(Instant, TaskId)> = self
            .deadlines
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();
        expired.sort();
        expired.into_iter().map(|(_, task_id)| task_id).collect()
    }

    /// Returns the number of running clocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Returns true if no clock is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(recipe: &str, index: usize) -> TaskId {
        TaskId::new(RecipeId::new(recipe), index)
    }

    #[test]
    fn test_expired_after_timeout() {
        let tracker = DeadlineTracker::new(Some(Duration::from_secs(10)));
        let start = Instant::now();
        tracker.register_at(task("a", 0), start);
        tracker.register_at(task("b", 0), start + Duration::from_secs(5));

        assert!(tracker.expired(start + Duration::from_secs(9)).is_empty());
        assert_eq!(tracker.expired(start + Duration::from_secs(10)), vec![task("a", 0)]);
        assert_eq!(
            tracker.expired(start + Duration::from_secs(60)),
            vec![task("a", 0), task("b", 0)]
        );
    }

    #[test]
    fn test_clear() {
        let tracker = DeadlineTracker::new(Some(Duration::from_secs(1)));
        tracker.register(task("a", 0));
        tracker.register(task("a", 1));
        tracker.register(task("b", 0));

        tracker.clear(&task("b", 0));
        assert_eq!(tracker.len(), 2);

        tracker.clear_recipe(&RecipeId::new("a"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_disabled_tracker_records_nothing() {
        let tracker = DeadlineTracker::new(None);
        tracker.register(task("a", 0));
        assert!(tracker.is_empty());
        assert!(tracker
            .expired(Instant::now() + Duration::from_secs(3600))
            .is_empty());
    }

    #[test]
    fn test_unrepresentable_deadline_is_skipped() {
        let tracker = DeadlineTracker::new(Some(Duration::MAX));
        tracker.register(task("a", 0));
        assert!(tracker.is_empty());
    }
}
