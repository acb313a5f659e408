//! End-to-end runs over the channel transport and the file-backed cache.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use recipeflow::cache::{FileArtifactStore, TestingContext, TestingContextCache, WriteToken};
use recipeflow::config::OrchestratorConfig;
use recipeflow::core::{Goal, LinkBundle, LinkField, Mode};
use recipeflow::cycles::CycleRegistry;
use recipeflow::messages::{ChannelPublisher, ErrorKind, OrderReport, OutboundMessage, StepReport};
use recipeflow::orchestrator::{Orchestrator, SubmitOutcome};
use recipeflow::recipe::Order;
use recipeflow::testing::{measurement_source, StageSimulator};

/// Plays the transformation services: answers every step on the outbound
/// channel and collects order reports until `expected` arrived.
async fn serve_steps(
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    simulator: StageSimulator,
    reports: mpsc::Sender<StepReport>,
    expected: usize,
) -> Vec<OrderReport> {
    let mut finished = Vec::new();
    while finished.len() < expected {
        let Some(message) = outbound.recv().await else {
            break;
        };
        match message {
            OutboundMessage::OrderReport { report, .. } => finished.push(report),
            step => {
                if let Some(report) = simulator.answer_message(&step) {
                    reports.send(report).await.unwrap();
                }
            }
        }
    }
    finished
}

async fn run_orders(orchestrator: Orchestrator, simulator: StageSimulator, orders: Vec<Order>) -> Vec<OrderReport> {
    let (publisher, outbound) = ChannelPublisher::new();
    let orchestrator = Arc::new(orchestrator.with_publisher(Arc::new(publisher)));
    let (report_tx, report_rx) = mpsc::channel(16);

    let runner = tokio::spawn(Arc::clone(&orchestrator).run(report_rx));
    let services = tokio::spawn(serve_steps(outbound, simulator, report_tx, orders.len()));

    for order in orders {
        assert_ok!(orchestrator.submit_order(order).await);
    }

    let reports = tokio::time::timeout(Duration::from_secs(5), services)
        .await
        .expect("orders did not finish in time")
        .unwrap();
    runner.await.unwrap();
    assert!(orchestrator.store().is_empty());
    reports
}

fn load_test_order(order_id: &str) -> Order {
    Order::new(order_id, "shop", Goal::ExecuteLoadTest)
        .with_mode(Mode::FromPastRequests)
        .with_source(measurement_source("md/1"))
        .with_context_label("cart")
}

#[tokio::test]
async fn test_full_cycle_over_channel() {
    let orchestrator = Orchestrator::new(
        Arc::new(CycleRegistry::standard()),
        Arc::new(ChannelPublisher::new().0),
    );
    let simulator = StageSimulator::new(orchestrator.routing().clone());

    let reports = run_orders(orchestrator, simulator, vec![load_test_order("o-1")]).await;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(report.successful);
    let artifacts = report.artifacts.as_ref().unwrap();
    for field in [
        LinkField::MeasurementData,
        LinkField::SessionLogs,
        LinkField::WorkloadModel,
        LinkField::LoadTest,
        LinkField::LoadTestReport,
    ] {
        assert!(artifacts.has(field), "missing {field}");
    }
}

#[tokio::test]
async fn test_failure_mid_cycle_over_channel() {
    let orchestrator = Orchestrator::new(
        Arc::new(CycleRegistry::standard()),
        Arc::new(ChannelPublisher::new().0),
    );
    let simulator = StageSimulator::new(orchestrator.routing().clone()).failing_at(
        Goal::BuildWorkloadModel,
        ErrorKind::InvalidInput,
        "no sessions",
    );

    let reports = run_orders(orchestrator, simulator, vec![load_test_order("o-1")]).await;

    assert_eq!(reports.len(), 1);
    assert!(!reports[0].successful);
    assert_eq!(reports[0].error.as_deref(), Some("invalid-input: no sessions"));
    let artifacts = reports[0].artifacts.as_ref().unwrap();
    assert!(artifacts.has(LinkField::SessionLogs));
    assert!(!artifacts.has(LinkField::WorkloadModel));
}

#[tokio::test]
async fn test_many_orders_concurrently() {
    let orchestrator = Orchestrator::new(
        Arc::new(CycleRegistry::standard()),
        Arc::new(ChannelPublisher::new().0),
    );
    let simulator = StageSimulator::new(orchestrator.routing().clone());
    let orders = (0..10).map(|i| load_test_order(&format!("o-{i}"))).collect();

    let reports = run_orders(orchestrator, simulator, orders).await;

    assert_eq!(reports.len(), 10);
    assert!(reports.iter().all(|r| r.successful));
    let mut ids: Vec<String> = reports.iter().map(|r| r.order_id.to_string()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_file_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig::new().with_cache_root(dir.path());

    let first = assert_ok!(Orchestrator::from_config(
        &config,
        CycleRegistry::standard(),
        Arc::new(ChannelPublisher::new().0),
    ));
    let simulator = StageSimulator::new(first.routing().clone());
    let reports = run_orders(first, simulator, vec![load_test_order("o-1")]).await;
    let produced = reports[0].artifacts.clone().unwrap();

    // A fresh process over the same directory answers from the cache.
    let (publisher, mut outbound) = ChannelPublisher::new();
    let second = assert_ok!(Orchestrator::from_config(
        &config,
        CycleRegistry::standard(),
        Arc::new(publisher),
    ));
    let outcome = assert_ok!(second.submit_order(load_test_order("o-2")).await);

    let SubmitOutcome::Satisfied { report } = outcome else {
        panic!("expected a cache hit, got {outcome:?}");
    };
    assert_eq!(
        report.artifacts.unwrap().get(LinkField::LoadTestReport),
        produced.get(LinkField::LoadTestReport)
    );
    assert!(matches!(
        outbound.recv().await,
        Some(OutboundMessage::OrderReport { .. })
    ));
}

#[tokio::test]
async fn test_file_cache_write_token_and_partial_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TestingContextCache::new(Arc::new(FileArtifactStore::new(dir.path())));
    let cart: TestingContext = ["cart".to_string()].into();
    let cart_and_orders: TestingContext = ["cart".to_string(), "orders".to_string()].into();
    let bundle = LinkBundle::new().with(LinkField::SessionLogs, "s/1");
    let token = WriteToken::derive(&["o-1", "shop"]);

    let first = assert_ok!(cache.store("shop", &cart, &bundle, Some(&token)).await);
    let replay = assert_ok!(cache.store("shop", &cart, &bundle, Some(&token)).await);
    assert_eq!(first.id, replay.id);

    assert_ok!(cache.store("shop", &cart_and_orders, &bundle, None).await);

    let reopened = TestingContextCache::new(Arc::new(FileArtifactStore::new(dir.path())));
    let exact = assert_ok!(reopened.get("shop", &cart, false).await);
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[&cart].len(), 1);

    let partial = assert_ok!(reopened.get("shop", &cart, true).await);
    assert_eq!(
        partial.keys().cloned().collect::<Vec<_>>(),
        vec![cart.clone(), cart_and_orders.clone()]
    );
}
