//! The orchestration message handler.

use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::deadlines::DeadlineTracker;
use super::intake;
use crate::cache::{
    ArtifactBackend, FileArtifactStore, InMemoryArtifactStore, TestingContext, TestingContextCache, WriteToken,
};
use crate::config::OrchestratorConfig;
use crate::core::{Goal, LinkBundle, LinkField, Mode};
use crate::cycles::CycleRegistry;
use crate::errors::{PublishError, RecipeflowError};
use crate::events::{event_types, EventSink, LoggingEventSink};
use crate::messages::{
    ErrorKind, MessagePublisher, OrderId, OrderReport, QueueRouting, RecipeId, ReportedError, StepReport, TaskId,
};
use crate::recipe::{Order, Recipe, RecipeHandle, RecipeStore, Task};

/// Result of submitting an order.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A recipe was created and its first task dispatched.
    Dispatched {
        /// The new recipe.
        recipe_id: RecipeId,
        /// Mode the cycle was taken from.
        mode: Mode,
        /// Goals the recipe will run, in order.
        goals: Vec<Goal>,
    },
    /// A recipe for this order is already live; nothing was created.
    AlreadyRunning {
        /// The live recipe.
        recipe_id: RecipeId,
    },
    /// Every goal's output was already available; the order was answered
    /// without dispatching.
    Satisfied {
        /// The success report that was published.
        report: OrderReport,
    },
    /// The recipe was created but its first task could not be published.
    /// An error order report was sent.
    DispatchFailed {
        /// The failed recipe.
        recipe_id: RecipeId,
    },
}

/// Why a step report was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No live recipe has the report's recipe id.
    UnknownRecipe,
    /// The recipe is not waiting for this task.
    NotOutstanding,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRecipe => write!(f, "unknown-recipe"),
            Self::NotOutstanding => write!(f, "not-outstanding"),
        }
    }
}

/// What handling one step report did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The next task was dispatched.
    Advanced {
        /// The task now outstanding.
        dispatched: TaskId,
    },
    /// The last task succeeded; a success order report was sent.
    Completed,
    /// The recipe failed; an error order report was sent.
    Failed,
    /// The report was ignored.
    Dropped(DropReason),
}

/// Snapshot of a recipe taken at its terminal transition.
#[derive(Debug)]
struct Finished {
    recipe_id: RecipeId,
    order_id: OrderId,
    tag: String,
    testing_context: TestingContext,
    source: LinkBundle,
}

impl Finished {
    fn of(recipe: &Recipe) -> Self {
        Self {
            recipe_id: recipe.id().clone(),
            order_id: recipe.order_id().clone(),
            tag: recipe.tag().to_string(),
            testing_context: recipe.testing_context().clone(),
            source: recipe.source().clone(),
        }
    }
}

/// Decided under the recipe lock, carried out after releasing it.
#[derive(Debug)]
enum Transition {
    Dispatch { task: Task, source: LinkBundle },
    Complete(Finished),
    Fail(Finished, ReportedError),
}

/// Drives recipes from order intake to their order report.
///
/// Reports for different recipes are handled concurrently. Every mutation
/// of one recipe happens under its lock, and the lock is released before
/// anything is published or the store is touched.
pub struct Orchestrator {
    registry: Arc<CycleRegistry>,
    store: RecipeStore,
    publisher: Arc<dyn MessagePublisher>,
    routing: QueueRouting,
    deadlines: DeadlineTracker,
    cache: Option<Arc<TestingContextCache>>,
    use_cache: bool,
    events: Arc<dyn EventSink>,
}

impl Orchestrator {
    /// Creates an orchestrator with default routing and timeout, no cache
    /// and a logging event sink.
    #[must_use]
    pub fn new(registry: Arc<CycleRegistry>, publisher: Arc<dyn MessagePublisher>) -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            registry,
            store: RecipeStore::new(),
            publisher,
            routing: defaults.routing(),
            deadlines: DeadlineTracker::new(defaults.task_timeout()),
            cache: None,
            use_cache: defaults.use_cache,
            events: Arc::new(LoggingEventSink::default()),
        }
    }

    /// Builds an orchestrator from a configuration.
    ///
    /// Validates the configuration and the registry, and opens the artifact
    /// cache: file-backed under `cache_root` when set, in memory otherwise.
    pub fn from_config(
        config: &OrchestratorConfig,
        registry: CycleRegistry,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Result<Self, RecipeflowError> {
        config.validate()?;
        registry.validate()?;

        let backend: Arc<dyn ArtifactBackend> = match &config.cache_root {
            Some(root) => Arc::new(FileArtifactStore::new(root.clone())),
            None => Arc::new(InMemoryArtifactStore::new()),
        };

        Ok(Self::new(Arc::new(registry), publisher)
            .with_config(config)
            .with_cache(Arc::new(TestingContextCache::new(backend))))
    }

    /// Applies routing, timeout and cache usage from a configuration.
    #[must_use]
    pub fn with_config(mut self, config: &OrchestratorConfig) -> Self {
        self.routing = config.routing();
        self.deadlines = DeadlineTracker::new(config.task_timeout());
        self.use_cache = config.use_cache;
        self
    }

    /// Replaces the publisher.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Sets the queue routing.
    #[must_use]
    pub fn with_routing(mut self, routing: QueueRouting) -> Self {
        self.routing = routing;
        self
    }

    /// Sets the task timeout; `None` disables deadlines.
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadlines = DeadlineTracker::new(timeout);
        self
    }

    /// Attaches an artifact cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<TestingContextCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the cycle registry.
    #[must_use]
    pub fn registry(&self) -> &CycleRegistry {
        &self.registry
    }

    /// Returns the store of live recipes.
    #[must_use]
    pub fn store(&self) -> &RecipeStore {
        &self.store
    }

    /// Returns the queue routing.
    #[must_use]
    pub fn routing(&self) -> &QueueRouting {
        &self.routing
    }

    /// Returns the deadline tracker.
    #[must_use]
    pub fn deadlines(&self) -> &DeadlineTracker {
        &self.deadlines
    }

    /// Returns the artifact cache, if one is attached.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<TestingContextCache>> {
        self.cache.as_ref()
    }

    /// Accepts an order.
    ///
    /// Chooses the mode and cycle prefix, skips leading goals whose output
    /// is already available (from the order itself or the cache), creates
    /// the recipe and dispatches its first task. An order whose recipe is
    /// still live is not started twice.
    ///
    /// # Errors
    ///
    /// Returns `NoCycle` if no registered cycle reaches the goal, and
    /// `Publish` if an order needing no steps cannot be answered.
    pub async fn submit_order(&self, order: Order) -> Result<SubmitOutcome, RecipeflowError> {
        if let Some(recipe_id) = self.store.find_by_order(&order.order_id) {
            info!(order_id = %order.order_id, recipe_id = %recipe_id, "Order already running");
            return Ok(SubmitOutcome::AlreadyRunning { recipe_id });
        }

        let cached = self.cached_links(&order).await;
        let available = order.source.clone().merged(&cached);
        let plan = intake::plan_order(&self.registry, &order, &available)?;

        let satisfied_fields: Vec<LinkField> = plan.satisfied.iter().map(Goal::produces).collect();
        let source = order
            .source
            .clone()
            .merged(&available.restricted_to(&satisfied_fields));

        if plan.is_satisfied() {
            info!(order_id = %order.order_id, goal = %order.goal, "Order satisfied without dispatching");
            let report = OrderReport::success(order.order_id.clone(), source);
            self.publish_order_report(report.clone()).await?;
            self.events.try_emit(
                event_types::ORDER_SATISFIED_FROM_CACHE,
                Some(json!({
                    "order_id": order.order_id.as_str(),
                    "tag": order.tag,
                    "goal": order.goal.as_str(),
                })),
            );
            return Ok(SubmitOutcome::Satisfied { report });
        }

        let recipe = Recipe::new(RecipeId::generate(), &order, &plan.remaining, source);
        let recipe_id = recipe.id().clone();
        let handle = self.store.insert(recipe);

        info!(
            order_id = %order.order_id,
            recipe_id = %recipe_id,
            mode = %plan.mode,
            steps = plan.remaining.len(),
            skipped = plan.satisfied.len(),
            "Recipe created"
        );
        self.events.try_emit(
            event_types::RECIPE_CREATED,
            Some(json!({
                "recipe_id": recipe_id.as_str(),
                "order_id": order.order_id.as_str(),
                "mode": plan.mode.as_str(),
                "goals": plan.remaining.iter().map(Goal::as_str).collect::<Vec<_>>(),
            })),
        );

        let transition = Self::advance(&mut handle.lock());
        match self.drive(&handle, transition).await {
            ReportOutcome::Advanced { .. } => Ok(SubmitOutcome::Dispatched {
                recipe_id,
                mode: plan.mode,
                goals: plan.remaining,
            }),
            // A fresh recipe has at least one task; anything but a dispatch
            // means the first publish failed.
            _ => Ok(SubmitOutcome::DispatchFailed { recipe_id }),
        }
    }

    /// Handles one step report.
    ///
    /// Reports for unknown or finished recipes, and reports for any task
    /// other than the one a recipe is waiting for, are dropped. A failure
    /// terminates the recipe; a success merges the reported links and
    /// dispatches the next task, or completes the recipe after the last one.
    pub async fn handle_report(&self, report: StepReport) -> ReportOutcome {
        let task_id = report.task_id.clone();
        let Some(handle) = self.store.get(&task_id.recipe_id) else {
            return self.drop_report(&task_id, DropReason::UnknownRecipe);
        };

        let transition = {
            let mut recipe = handle.lock();
            if !recipe.is_outstanding(&task_id) {
                None
            } else if report.successful {
                if let Some(delta) = &report.result {
                    recipe.apply_report(delta);
                }
                Some(Self::advance(&mut recipe))
            } else {
                recipe.fail();
                Some(Transition::Fail(Finished::of(&recipe), report.error_or_unknown()))
            }
        };

        let Some(transition) = transition else {
            return self.drop_report(&task_id, DropReason::NotOutstanding);
        };

        self.deadlines.clear(&task_id);
        debug!(task_id = %task_id, successful = report.successful, "Applied step report");
        self.drive(&handle, transition).await
    }

    /// Cancels the live recipe of an order.
    ///
    /// Returns false if the order has no live recipe.
    pub async fn cancel(&self, order_id: &OrderId) -> bool {
        let Some(handle) = self
            .store
            .find_by_order(order_id)
            .and_then(|recipe_id| self.store.get(&recipe_id))
        else {
            return false;
        };

        let error = ReportedError {
            kind: ErrorKind::Cancelled,
            message: "order cancelled".to_string(),
        };
        match Self::terminate(&handle, error) {
            Some((finished, error)) => {
                self.finish_failed(finished, error).await;
                true
            }
            None => false,
        }
    }

    /// Fails every recipe whose outstanding task missed its deadline.
    ///
    /// Returns the number of recipes failed.
    pub async fn expire_overdue(&self) -> usize {
        self.expire_overdue_at(Instant::now()).await
    }

    /// Like [`Orchestrator::expire_overdue`], judged at `now`.
    pub async fn expire_overdue_at(&self, now: Instant) -> usize {
        let mut failed = 0;
        for task_id in self.deadlines.expired(now) {
            self.deadlines.clear(&task_id);
            warn!(task_id = %task_id, "Task missed its deadline");

            let message = self
                .deadlines
                .timeout()
                .map(|t| format!("no report within {}s", t.as_secs_f64()))
                .unwrap_or_default();
            let report = StepReport::failure(task_id, ErrorKind::Timeout, message);
            if self.handle_report(report).await == ReportOutcome::Failed {
                failed += 1;
            }
        }
        failed
    }

    /// Handles reports from `reports` until the channel closes.
    ///
    /// Each report is handled on its own task; this returns once the channel
    /// is closed and every spawned handler has finished.
    pub async fn run(self: Arc<Self>, mut reports: mpsc::Receiver<StepReport>) {
        let mut in_flight = JoinSet::new();

        while let Some(report) = reports.recv().await {
            let orchestrator = Arc::clone(&self);
            in_flight.spawn(async move {
                orchestrator.handle_report(report).await;
            });
            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        info!("Report stream closed");
    }

    /// Spawns a task calling [`Orchestrator::expire_overdue`] every
    /// `interval` until `shutdown` turns true or its sender is dropped.
    pub fn spawn_watchdog(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let failed = self.expire_overdue().await;
                        if failed > 0 {
                            info!(failed, "Expired overdue recipes");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Watchdog stopped");
        })
    }

    fn advance(recipe: &mut Recipe) -> Transition {
        match recipe.next() {
            Some(task) => Transition::Dispatch {
                task,
                source: recipe.source().clone(),
            },
            None => {
                recipe.complete();
                Transition::Complete(Finished::of(recipe))
            }
        }
    }

    /// Fails a recipe that is not terminal yet.
    fn terminate(handle: &RecipeHandle, error: ReportedError) -> Option<(Finished, ReportedError)> {
        let mut recipe = handle.lock();
        if recipe.status().is_terminal() {
            return None;
        }
        recipe.fail();
        Some((Finished::of(&recipe), error))
    }

    async fn drive(&self, handle: &RecipeHandle, transition: Transition) -> ReportOutcome {
        match transition {
            Transition::Dispatch { task, source } => self.dispatch(handle, task, source).await,
            Transition::Complete(finished) => {
                self.finish_succeeded(finished).await;
                ReportOutcome::Completed
            }
            Transition::Fail(finished, error) => {
                self.finish_failed(finished, error).await;
                ReportOutcome::Failed
            }
        }
    }

    async fn dispatch(&self, handle: &RecipeHandle, task: Task, source: LinkBundle) -> ReportOutcome {
        let task_id = task.id().clone();
        self.deadlines.register(task_id.clone());

        match task.execute(source, self.publisher.as_ref(), &self.routing).await {
            Ok(()) => {
                self.events.try_emit(
                    event_types::TASK_DISPATCHED,
                    Some(json!({
                        "recipe_id": task_id.recipe_id.as_str(),
                        "task_id": task_id.to_string(),
                        "goal": task.goal().as_str(),
                    })),
                );
                ReportOutcome::Advanced { dispatched: task_id }
            }
            Err(e) => {
                error!(task_id = %task_id, goal = %task.goal(), error = %e, "Failed to dispatch task");
                self.deadlines.clear(&task_id);
                let error = ReportedError {
                    kind: ErrorKind::DispatchFailed,
                    message: e.to_string(),
                };
                match Self::terminate(handle, error) {
                    Some((finished, error)) => {
                        self.finish_failed(finished, error).await;
                        ReportOutcome::Failed
                    }
                    // Cancelled or expired while publishing.
                    None => ReportOutcome::Dropped(DropReason::NotOutstanding),
                }
            }
        }
    }

    async fn finish_succeeded(&self, finished: Finished) {
        self.store.remove(&finished.recipe_id);
        self.deadlines.clear_recipe(&finished.recipe_id);
        info!(
            recipe_id = %finished.recipe_id,
            order_id = %finished.order_id,
            "Recipe completed"
        );

        let report = OrderReport::success(finished.order_id.clone(), finished.source.clone());
        if let Err(e) = self.publish_order_report(report).await {
            error!(order_id = %finished.order_id, error = %e, "Failed to publish order report");
        }
        self.events.try_emit(
            event_types::RECIPE_COMPLETED,
            Some(json!({
                "recipe_id": finished.recipe_id.as_str(),
                "order_id": finished.order_id.as_str(),
            })),
        );

        self.store_in_cache(&finished).await;
    }

    async fn finish_failed(&self, finished: Finished, error: ReportedError) {
        self.store.remove(&finished.recipe_id);
        self.deadlines.clear_recipe(&finished.recipe_id);
        warn!(
            recipe_id = %finished.recipe_id,
            order_id = %finished.order_id,
            error = %error,
            "Recipe failed"
        );

        let report = OrderReport::error(
            finished.order_id.clone(),
            Some(finished.source),
            error.to_string(),
        );
        if let Err(e) = self.publish_order_report(report).await {
            error!(order_id = %finished.order_id, error = %e, "Failed to publish order report");
        }
        self.events.try_emit(
            event_types::RECIPE_FAILED,
            Some(json!({
                "recipe_id": finished.recipe_id.as_str(),
                "order_id": finished.order_id.as_str(),
                "kind": error.kind.to_string(),
                "message": error.message,
            })),
        );
    }

    async fn publish_order_report(&self, report: OrderReport) -> Result<(), PublishError> {
        self.publisher
            .publish_order_report(&self.routing.order_report_topic, report)
            .await
    }

    fn drop_report(&self, task_id: &TaskId, reason: DropReason) -> ReportOutcome {
        warn!(task_id = %task_id, reason = %reason, "Dropping step report");
        self.events.try_emit(
            event_types::REPORT_DROPPED,
            Some(json!({
                "recipe_id": task_id.recipe_id.as_str(),
                "task_id": task_id.to_string(),
                "reason": reason.to_string(),
            })),
        );
        ReportOutcome::Dropped(reason)
    }

    /// Links of the artifact cached for the order's testing context that
    /// was built from the order's own inputs.
    async fn cached_links(&self, order: &Order) -> LinkBundle {
        let Some(cache) = self.cache.as_ref().filter(|_| self.use_cache) else {
            return LinkBundle::new();
        };

        match cache
            .find_matching(&order.tag, &order.testing_context, &order.source)
            .await
        {
            Ok(Some((id, links))) => {
                debug!(order_id = %order.order_id, artifact_id = %id.as_str(), "Reusing cached artifact");
                links
            }
            Ok(None) => LinkBundle::new(),
            Err(e) => {
                warn!(order_id = %order.order_id, tag = %order.tag, error = %e, "Cache lookup failed");
                LinkBundle::new()
            }
        }
    }

    async fn store_in_cache(&self, finished: &Finished) {
        let Some(cache) = self.cache.as_ref().filter(|_| self.use_cache) else {
            return;
        };

        let token = WriteToken::derive(&[finished.order_id.as_str(), &finished.tag]);
        match cache
            .store(&finished.tag, &finished.testing_context, &finished.source, Some(&token))
            .await
        {
            Ok(outcome) => {
                self.events.try_emit(
                    event_types::CACHE_STORED,
                    Some(json!({
                        "recipe_id": finished.recipe_id.as_str(),
                        "tag": finished.tag,
                        "artifact_id": outcome.id.as_str(),
                        "disposition": format!("{:?}", outcome.disposition),
                    })),
                );
            }
            Err(e) => {
                warn!(recipe_id = %finished.recipe_id, tag = %finished.tag, error = %e, "Failed to cache artifacts");
            }
        }
    }
}
