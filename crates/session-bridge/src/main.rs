//! # Session Bridge
//!
//! Runs the session core over the in-memory network and serves the
//! line-delimited JSON protocol on stdin/stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mc_session::{InMemoryBackend, SessionService};
use session_bridge::{serve, BridgeConfig};

fn init_logging(filter: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow!(e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::from_env();
    init_logging(&config.log_filter)?;

    info!("===========================================");
    info!("  Session Bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        nodes = config.nodes,
        max_concurrent_requests = config.service.max_concurrent_requests,
        "Starting in-memory backend"
    );

    let backend = InMemoryBackend::new(config.nodes, config.chain_propagation);
    let service = Arc::new(SessionService::new(config.service, backend.ports()));

    tokio::select! {
        served = serve(Arc::clone(&service), tokio::io::stdin(), tokio::io::stdout()) => {
            served.context("stdio transport failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    service.shutdown().await;
    Ok(())
}
