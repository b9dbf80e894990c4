//! noor worker entry point.
//!
//! Boots one offline worker (install, activate, reminder schedule) and
//! serves its operations as MCP tools on stdio. Logging goes to stderr to
//! avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use noor_client::{FetchConfig, HttpNetwork, LogNotifier, Worker};
use noor_core::{AppConfig, Store};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

/// Install and activate the worker. Failures are logged; until the worker
/// is active its fetches go straight to the network.
async fn activate_or_degrade(worker: &Worker) {
    match worker.install().await {
        Ok(count) => tracing::info!(count, "worker installed"),
        Err(e) => {
            tracing::error!(error = %e, "worker install failed; requests go straight to the network");
            return;
        }
    }

    if let Err(e) = worker.activate().await {
        tracing::warn!(error = %e, state = ?worker.state(), "worker activation failed; waiting for skip_waiting");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(db = %config.db_path.display(), origin = %config.origin, "starting noor worker on stdio transport");

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let network = HttpNetwork::new(config.origin_url()?, FetchConfig::from(&config))?;
    let worker = Worker::new(store.clone(), Arc::new(network), Arc::new(LogNotifier), &config)?;

    activate_or_degrade(&worker).await;

    worker.scheduler().schedule_prayer_notifications().await?;
    let scheduler = worker.scheduler().clone().spawn();

    let mut client_messages = worker.subscribe_clients();
    tokio::spawn(async move {
        loop {
            match client_messages.recv().await {
                Ok(message) => tracing::info!(?message, "client message"),
                Err(broadcast::error::RecvError::Lagged(n)) => tracing::warn!(skipped = n, "client messages dropped"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let handler = handler::NoorServer::new(handler::ServerContext::new(worker, store));
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    scheduler.shutdown().await;

    Ok(())
}
