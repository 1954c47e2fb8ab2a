//! # CAS broker server
//!
//! Main entry point for the CAS identity broker.

#![forbid(unsafe_code)]

use kc_cas_server::{Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("CAS broker starting...");

    Server::new(config)?.run().await
}
