//! LFG backend entry point.
//!
//! Wires the SQLite store, the upstream clients, and the gateway together,
//! then serves until interrupted.

mod config;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lfg_gateway::GatewayService;
use lfg_store::Store;
use lfg_upstream::{AccountResolver, KillProofClient, KillProofProvider, TokenResolver};

use crate::config::NodeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::from_env()?;
    info!(
        addr = %config.gateway.http_addr(),
        database = %config.database_path,
        "starting lfg-node"
    );

    let store = Arc::new(Store::open(&config.database_path)?);
    let resolver: Arc<dyn TokenResolver> = Arc::new(AccountResolver::new()?);
    let kill_proof: Arc<dyn KillProofProvider> = Arc::new(KillProofClient::new()?);

    let service = GatewayService::new(config.gateway, store, resolver, kill_proof)?;

    let shutdown = service.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown.send(true);
        }
    });

    service.start().await?;
    Ok(())
}
