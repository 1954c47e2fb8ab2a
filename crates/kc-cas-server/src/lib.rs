//! # kc-cas-server
//!
//! Axum server hosting the CAS identity broker.
//!
//! This crate wires the `kc-protocol-cas` endpoints to an in-memory broker:
//! - CAS login, callback and single-logout endpoints
//! - Logout initiation and the stored federated token
//! - Landing pages and health checks
//!
//! ## Usage
//!
//! ```ignore
//! use kc_cas_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let server = Server::new(config)?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod store;

pub use config::ServerConfig;
pub use router::create_router;
pub use state::AppState;
pub use store::InMemoryBroker;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use kc_protocol_cas::CasIdentityProvider;
use tokio::net::TcpListener;

/// The CAS broker server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// # Errors
    ///
    /// Fails if the CAS provider configuration is invalid.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let provider = CasIdentityProvider::new(config.cas.clone())?;
        tracing::info!(
            alias = %provider.alias(),
            realm = %config.realm,
            cas = %config.cas.server_url_prefix,
            "CAS identity provider configured"
        );
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Creates a server around an existing provider.
    #[must_use]
    pub fn with_provider(config: ServerConfig, provider: Arc<CasIdentityProvider>) -> Self {
        Self {
            state: AppState::new(config, provider),
        }
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and blocks until it receives a shutdown signal.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.state.config.bind_address()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Fails if the server stops with an I/O error.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let app = create_router(self.state);

        tracing::info!("Server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Returns the application state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Creates a router without starting the server.
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
