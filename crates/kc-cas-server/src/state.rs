//! Application state management.
//!
//! This module defines the shared state that is passed to all request handlers.

use std::sync::Arc;

use kc_protocol_cas::endpoints::CasState;
use kc_protocol_cas::CasIdentityProvider;

use crate::config::ServerConfig;
use crate::store::InMemoryBroker;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// The CAS identity provider.
    pub provider: Arc<CasIdentityProvider>,

    /// Broker storage.
    pub broker: Arc<InMemoryBroker>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: ServerConfig, provider: Arc<CasIdentityProvider>) -> Self {
        let broker = Arc::new(InMemoryBroker::new(
            Arc::clone(&provider),
            config.base_url.clone(),
            config.realm.clone(),
        ));
        Self {
            config: Arc::new(config),
            provider,
            broker,
        }
    }

    /// Gets the state for the CAS protocol endpoints.
    pub fn cas_state(&self) -> CasState<InMemoryBroker> {
        CasState::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.broker),
            self.config.realm.clone(),
            self.config.base_url.clone(),
        )
        .with_auth_session_lifespan(self.config.auth_session_duration())
    }

    /// Returns true if the request path addresses the configured provider.
    pub fn serves(&self, realm: &str, alias: &str) -> bool {
        self.config.realm == realm && self.provider.alias() == alias
    }
}
