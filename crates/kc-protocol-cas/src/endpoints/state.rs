//! Endpoint state and the broker contract.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::CasError;
use crate::events::BrokerEvent;
use crate::handshake::PendingAuthentication;
use crate::identity::BrokeredIdentity;
use crate::provider::CasIdentityProvider;
use crate::session::UserSession;

/// Default lifetime of a pending authentication, in seconds.
pub const DEFAULT_AUTH_SESSION_LIFESPAN_SECS: i64 = 1800;

/// Session storage and login completion, provided by the hosting broker.
///
/// Implementations must be safe for concurrent use; the endpoints hold no
/// other shared state.
#[async_trait]
pub trait BrokerSessionProvider: Send + Sync + 'static {
    /// Stores a pending authentication under its state.
    async fn save_pending(&self, pending: PendingAuthentication) -> Result<(), BrokerError>;

    /// Removes and returns the pending authentication for `state`.
    ///
    /// A record can be taken at most once.
    async fn take_pending(&self, state: &str) -> Result<Option<PendingAuthentication>, BrokerError>;

    /// Completes a login and returns the URL the browser continues to.
    async fn authenticated(
        &self,
        pending: &PendingAuthentication,
        identity: BrokeredIdentity,
    ) -> Result<String, BrokerError>;

    /// Looks up a user session by id.
    async fn get_user_session(&self, id: &str) -> Result<Option<UserSession>, BrokerError>;

    /// Ends and forgets a session whose CAS logout round trip came back, and
    /// returns the URL the browser continues to.
    async fn finish_logout(&self, session: UserSession) -> Result<String, BrokerError>;

    /// Records an audit event.
    async fn record_event(&self, event: BrokerEvent);
}

/// Error type for broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BrokerError> for CasError {
    fn from(err: BrokerError) -> Self {
        Self::Broker(err.to_string())
    }
}

/// State shared by the CAS endpoints of one identity provider.
pub struct CasState<B>
where
    B: BrokerSessionProvider,
{
    /// The identity provider.
    pub provider: Arc<CasIdentityProvider>,
    /// The hosting broker.
    pub broker: Arc<B>,
    /// Realm the provider belongs to.
    pub realm: String,
    /// Public base URL of the broker.
    pub base_url: String,
    /// How long a login redirect stays valid.
    pub auth_session_lifespan: Duration,
}

impl<B: BrokerSessionProvider> Clone for CasState<B> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            broker: Arc::clone(&self.broker),
            realm: self.realm.clone(),
            base_url: self.base_url.clone(),
            auth_session_lifespan: self.auth_session_lifespan,
        }
    }
}

impl<B: BrokerSessionProvider> CasState<B> {
    /// Creates endpoint state.
    pub fn new(
        provider: Arc<CasIdentityProvider>,
        broker: Arc<B>,
        realm: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            broker,
            realm: realm.into(),
            base_url: base_url.into(),
            auth_session_lifespan: Duration::seconds(DEFAULT_AUTH_SESSION_LIFESPAN_SECS),
        }
    }

    /// Sets the pending authentication lifetime.
    #[must_use]
    pub const fn with_auth_session_lifespan(mut self, lifespan: Duration) -> Self {
        self.auth_session_lifespan = lifespan;
        self
    }

    /// Returns true if the request path addresses this provider.
    #[must_use]
    pub fn serves(&self, realm: &str, alias: &str) -> bool {
        self.realm == realm && self.provider.alias() == alias
    }
}
