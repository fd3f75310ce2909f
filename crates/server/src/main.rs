//! offgrid server entry point.
//!
//! Boots the offline cache gateway and exposes it over MCP on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offgrid_client::gateway::{UPDATE_CONTENT_TAG, run_sync_worker};
use offgrid_client::{
    EventOutcome, FetchConfig, Gateway, GatewayEvent, GatewayOptions, HttpNetwork, TracingNotifier, WindowRegistry,
};
use offgrid_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.cache_version, origin = %config.origin, "Starting offgrid server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    tracing::debug!(path = %config.db_path.display(), schema = db.schema_version().await?, "database ready");
    let network = Arc::new(HttpNetwork::new(FetchConfig::from(&config))?);
    let options = GatewayOptions::from_config(&config)?;

    let (sync_tx, sync_rx) = mpsc::unbounded_channel();
    let gateway = Gateway::new(db, network, Arc::new(TracingNotifier::new()), Arc::new(WindowRegistry::new()), options)
        .with_sync_queue(sync_tx);

    tokio::spawn(run_sync_worker(gateway.clone(), sync_rx));
    tokio::spawn(install(gateway.clone()));
    if let Some(every) = config.periodic_refresh_interval() {
        tokio::spawn(periodic_refresh(gateway.clone(), every));
    }

    let handler = handler::OffgridServer::new(gateway);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

async fn install(gateway: Gateway) {
    match gateway.dispatch(GatewayEvent::Install).await {
        Ok(EventOutcome::Installed(report)) => {
            tracing::info!(critical = report.critical, cached = report.cached, activated = report.activated, "gateway ready");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "gateway install failed, passing all requests through"),
    }
}

async fn periodic_refresh(gateway: Gateway, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = gateway.dispatch(GatewayEvent::PeriodicSync(UPDATE_CONTENT_TAG.to_string())).await {
            tracing::error!(error = %e, "periodic content refresh failed");
        }
    }
}
