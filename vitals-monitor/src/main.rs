//! Vitals Monitor - one dashboard session against the vitals kernel
//!
//! - Polls the roster and recent vitals every 500 ms (configurable)
//! - Raises a single console banner per critical episode, auto-cleared after 5 s
//! - Follows the administrative audit trail and the data log every 2 s

mod client;
mod config;
mod eventlog;
mod poller;
mod presenter;

use anyhow::{Context, Result};
use client::{AuditFeed, KernelClient};
use config::MonitorConfig;
use eventlog::EventLogFollower;
use poller::PollingClient;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vitals_core::AlertBoard;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = MonitorConfig::from_env();
    if cfg.api_key.is_none() {
        warn!("VITALS_API_KEY not set, the kernel will refuse every request");
    }
    info!(kernel = %cfg.kernel_url, "starting monitoring session");

    let kernel = KernelClient::new(&cfg.kernel_url, cfg.api_key.clone()).context("failed to build HTTP client")?;
    let board = AlertBoard::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller = PollingClient::new(kernel.clone(), cfg.window, cfg.poll_interval, board.clone());
    let views = poller.subscribe();
    let (records_tx, records_rx) = mpsc::channel(64);

    let presenter = tokio::spawn(presenter::run(views, board.subscribe(), records_rx, shutdown_rx.clone()));
    let polling = tokio::spawn(poller.run(shutdown_rx.clone()));
    let events = tokio::spawn(EventLogFollower::new(kernel.clone(), AuditFeed::Events).run(
        cfg.log_poll_interval,
        records_tx.clone(),
        shutdown_rx.clone(),
    ));
    let data_log = tokio::spawn(EventLogFollower::new(kernel, AuditFeed::DataLog).run(
        cfg.log_poll_interval,
        records_tx,
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutting down");
    shutdown_tx.send_replace(true);

    for task in [polling, events, data_log, presenter] {
        if let Err(e) = task.await {
            warn!("task ended abnormally: {e}");
        }
    }
    Ok(())
}
