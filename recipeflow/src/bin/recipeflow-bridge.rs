//! Line-oriented bridge between a message relay and the orchestrator.
//!
//! Reads inbound JSON lines (orders, step reports, cancellations) from stdin
//! and writes every outbound message as a JSON line to stdout. Logs go to
//! stderr.
//!
//! Usage: `recipeflow-bridge [config.json]`

use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use recipeflow::config::OrchestratorConfig;
use recipeflow::cycles::CycleRegistry;
use recipeflow::messages::JsonLinesPublisher;
use recipeflow::observability::init_tracing;
use recipeflow::orchestrator::{InboundMessage, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => OrchestratorConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => OrchestratorConfig::default(),
    };
    init_tracing(config.log_format, &config.log_level).context("initializing logging")?;

    let publisher = Arc::new(JsonLinesPublisher::new(tokio::io::stdout()));
    let orchestrator = Arc::new(
        Orchestrator::from_config(&config, CycleRegistry::standard(), publisher)
            .context("building orchestrator")?,
    );
    info!(queue_prefix = %config.queue_prefix, "Bridge started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watchdog = Arc::clone(&orchestrator).spawn_watchdog(config.watchdog_interval(), shutdown_rx);

    let (report_tx, report_rx) = mpsc::channel(256);
    let runner = tokio::spawn(Arc::clone(&orchestrator).run(report_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match InboundMessage::from_json_line(&line) {
            Ok(InboundMessage::Order(order)) => {
                let order_id = order.order_id.clone();
                if let Err(e) = orchestrator.submit_order(order).await {
                    error!(order_id = %order_id, error = %e, "Order rejected");
                }
            }
            Ok(InboundMessage::Report(report)) => {
                report_tx.send(report).await.context("report handler stopped")?;
            }
            Ok(InboundMessage::Cancel { order_id }) => {
                if !orchestrator.cancel(&order_id).await {
                    warn!(order_id = %order_id, "No live recipe to cancel");
                }
            }
            Err(e) => warn!(error = %e, "Skipping malformed line"),
        }
    }

    drop(report_tx);
    runner.await.context("report handler panicked")?;
    if shutdown_tx.send(true).is_err() {
        debug!("Watchdog already stopped");
    }
    watchdog.await.context("watchdog panicked")?;

    info!(live_recipes = orchestrator.store().len(), "Bridge stopped");
    Ok(())
}
