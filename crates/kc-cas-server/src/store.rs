//! In-memory broker storage.
//!
//! Holds pending logins, brokered users, user sessions and the audit log.
//! Nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kc_protocol_cas::endpoints::{BrokerError, BrokerSessionProvider};
use kc_protocol_cas::events::{BrokerEvent, EventOutcome};
use kc_protocol_cas::handshake::PendingAuthentication;
use kc_protocol_cas::identity::{BrokeredIdentity, LocalUser};
use kc_protocol_cas::session::{UserSession, UserSessionState};
use kc_protocol_cas::CasIdentityProvider;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound of retained audit events; the oldest are dropped first.
const MAX_EVENTS: usize = 1000;

/// A local user linked to a CAS principal.
#[derive(Debug, Clone)]
pub struct FederatedUser {
    /// The local user.
    pub user: LocalUser,
    /// CAS principal.
    pub federated_id: String,
    /// Identity provider alias.
    pub identity_provider: String,
    /// Stored federated token (the CAS response as JSON).
    pub token: String,
}

/// Broker storage kept in process memory.
pub struct InMemoryBroker {
    provider: Arc<CasIdentityProvider>,
    base_url: String,
    realm: String,
    pending: RwLock<HashMap<String, PendingAuthentication>>,
    users: RwLock<HashMap<String, FederatedUser>>,
    sessions: RwLock<HashMap<String, UserSession>>,
    events: RwLock<Vec<BrokerEvent>>,
}

impl InMemoryBroker {
    /// Creates empty storage for one realm.
    pub fn new(
        provider: Arc<CasIdentityProvider>,
        base_url: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            realm: realm.into(),
            pending: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Marks an active session as logging out and returns it.
    ///
    /// Returns `None` if the session does not exist or is not active.
    pub fn begin_logout(&self, session_id: &str) -> Option<UserSession> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(session_id)?;
        if session.state != UserSessionState::Active {
            return None;
        }
        session.state = UserSessionState::LoggingOut;
        Some(session.clone())
    }

    /// Returns a session by id.
    pub fn session(&self, session_id: &str) -> Option<UserSession> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Returns the user linked to a CAS principal.
    pub fn federated_user(&self, federated_id: &str) -> Option<FederatedUser> {
        self.users.read().get(federated_id).cloned()
    }

    /// Returns the federated token of the user owning an active session.
    pub fn token_for_session(&self, session_id: &str) -> Option<String> {
        let session = self.session(session_id)?;
        if session.state != UserSessionState::Active {
            return None;
        }
        self.users
            .read()
            .values()
            .find(|link| link.user.id == session.user_id)
            .map(|link| link.token.clone())
    }

    /// Returns a copy of the audit log, oldest first.
    pub fn events(&self) -> Vec<BrokerEvent> {
        self.events.read().clone()
    }

    /// Number of pending logins.
    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    /// The page a browser lands on after login when no redirect was given.
    pub fn account_url(&self) -> String {
        format!("{}/realms/{}/account", self.base_url.trim_end_matches('/'), self.realm)
    }

    /// The page a browser lands on after logout.
    pub fn logged_out_url(&self) -> String {
        format!("{}/realms/{}/logged-out", self.base_url.trim_end_matches('/'), self.realm)
    }

    /// Resolves the post-login redirect. Targets outside the broker's origin
    /// fall back to the account page.
    fn continue_url(&self, redirect_uri: Option<&str>, session_id: &str) -> Result<Url, BrokerError> {
        let account = Url::parse(&self.account_url())
            .map_err(|e| BrokerError::Internal(format!("invalid base URL: {e}")))?;

        let mut next = match redirect_uri.map(|uri| account.join(uri)) {
            Some(Ok(url)) if url.origin() == account.origin() => url,
            Some(_) => {
                warn!(redirect_uri = ?redirect_uri, "Ignoring redirect outside the broker");
                account
            }
            None => account,
        };
        next.query_pairs_mut().append_pair("session_state", session_id);
        Ok(next)
    }

    fn link_user(&self, identity: &BrokeredIdentity, token: String) -> LocalUser {
        let mut users = self.users.write();
        if let Some(link) = users.get_mut(&identity.id) {
            self.provider.update_brokered_user(&mut link.user, identity);
            link.token = token;
            debug!(user = %link.user.username, "Updated brokered user");
            return link.user.clone();
        }

        let mut user = LocalUser::new(&identity.username);
        user.email.clone_from(&identity.email);
        user.email_verified = identity.trust_email && identity.email.is_some();
        user.first_name.clone_from(&identity.first_name);
        user.last_name.clone_from(&identity.last_name);
        self.provider.import_new_user(&mut user, identity);
        info!(user = %user.username, user_id = %user.id, "Imported brokered user");

        users.insert(
            identity.id.clone(),
            FederatedUser {
                user: user.clone(),
                federated_id: identity.id.clone(),
                identity_provider: identity.identity_provider.clone(),
                token,
            },
        );
        user
    }
}

#[async_trait]
impl BrokerSessionProvider for InMemoryBroker {
    async fn save_pending(&self, pending: PendingAuthentication) -> Result<(), BrokerError> {
        let now = Utc::now();
        let mut map = self.pending.write();
        map.retain(|_, p| !p.is_expired_at(now));
        map.insert(pending.state.as_str().to_string(), pending);
        Ok(())
    }

    async fn take_pending(&self, state: &str) -> Result<Option<PendingAuthentication>, BrokerError> {
        Ok(self.pending.write().remove(state))
    }

    async fn authenticated(
        &self,
        pending: &PendingAuthentication,
        identity: BrokeredIdentity,
    ) -> Result<String, BrokerError> {
        let token = self
            .provider
            .retrieve_token(&identity)
            .map_err(|e| BrokerError::Internal(e.to_string()))?;
        let user = self.link_user(&identity, token);

        let session = UserSession::new(user.id, &user.username, &identity.identity_provider);
        let next = self.continue_url(pending.redirect_uri.as_deref(), &session.id)?;
        self.sessions.write().insert(session.id.clone(), session);

        Ok(next.to_string())
    }

    async fn get_user_session(&self, id: &str) -> Result<Option<UserSession>, BrokerError> {
        Ok(self.session(id))
    }

    async fn finish_logout(&self, session: UserSession) -> Result<String, BrokerError> {
        self.sessions
            .write()
            .remove(&session.id)
            .ok_or_else(|| BrokerError::NotFound(format!("user session {}", session.id)))?;
        Ok(self.logged_out_url())
    }

    async fn record_event(&self, event: BrokerEvent) {
        match event.outcome {
            EventOutcome::Success => info!(
                event_type = ?event.event_type,
                realm = ?event.realm,
                user = ?event.user_id,
                "Broker event"
            ),
            EventOutcome::Failure => warn!(
                event_type = ?event.event_type,
                realm = ?event.realm,
                error = ?event.error,
                "Broker event"
            ),
        }

        let mut events = self.events.write();
        if events.len() >= MAX_EVENTS {
            events.remove(0);
        }
        events.push(event);
    }
}
