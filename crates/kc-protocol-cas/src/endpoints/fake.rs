//! In-memory broker for endpoint tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::fake::CountingClient;
use crate::config::CasIdentityProviderConfig;
use crate::events::BrokerEvent;
use crate::handshake::PendingAuthentication;
use crate::identity::BrokeredIdentity;
use crate::provider::CasIdentityProvider;
use crate::session::UserSession;

use super::state::{BrokerError, BrokerSessionProvider, CasState};

#[derive(Debug, Default)]
pub(crate) struct FakeBroker {
    pub(crate) pending: Mutex<HashMap<String, PendingAuthentication>>,
    pub(crate) sessions: Mutex<HashMap<String, UserSession>>,
    pub(crate) completed: Mutex<Vec<BrokeredIdentity>>,
    pub(crate) events: Mutex<Vec<BrokerEvent>>,
}

impl FakeBroker {
    pub(crate) fn only_pending(broker: &Self) -> PendingAuthentication {
        let pending = broker.pending.lock().unwrap();
        assert_eq!(pending.len(), 1);
        pending.values().next().cloned().unwrap()
    }

    pub(crate) fn pending_count(broker: &Self) -> usize {
        broker.pending.lock().unwrap().len()
    }

    pub(crate) fn add_session(&self, session: UserSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }
}

#[async_trait]
impl BrokerSessionProvider for FakeBroker {
    async fn save_pending(&self, pending: PendingAuthentication) -> Result<(), BrokerError> {
        self.pending
            .lock()
            .unwrap()
            .insert(pending.state.as_str().to_string(), pending);
        Ok(())
    }

    async fn take_pending(&self, state: &str) -> Result<Option<PendingAuthentication>, BrokerError> {
        Ok(self.pending.lock().unwrap().remove(state))
    }

    async fn authenticated(
        &self,
        pending: &PendingAuthentication,
        identity: BrokeredIdentity,
    ) -> Result<String, BrokerError> {
        self.completed.lock().unwrap().push(identity);
        Ok(pending
            .redirect_uri
            .clone()
            .unwrap_or_else(|| "/realms/demo/account".to_string()))
    }

    async fn get_user_session(&self, id: &str) -> Result<Option<UserSession>, BrokerError> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn finish_logout(&self, session: UserSession) -> Result<String, BrokerError> {
        self.sessions.lock().unwrap().remove(&session.id);
        Ok("/realms/demo/logged-out".to_string())
    }

    async fn record_event(&self, event: BrokerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub(crate) fn cas_state(
    validation_body: &str,
) -> (CasState<FakeBroker>, Arc<FakeBroker>, Arc<CountingClient>) {
    let client = Arc::new(CountingClient::xml(validation_body));
    let provider = CasIdentityProvider::with_client(
        CasIdentityProviderConfig::new("cas", "https://cas.example.org/cas"),
        client.clone(),
    )
    .unwrap();
    let broker = Arc::new(FakeBroker::default());
    let state = CasState::new(
        Arc::new(provider),
        broker.clone(),
        "demo",
        "https://broker.example.com",
    );
    (state, broker, client)
}

pub(crate) async fn issue_pending(state: &CasState<FakeBroker>, broker: &FakeBroker) -> String {
    let callback = state
        .provider
        .callback_url(&state.base_url, &state.realm)
        .unwrap();
    let pending = PendingAuthentication::issue("auth-1", callback.as_str(), state.auth_session_lifespan)
        .with_redirect_uri("/app");
    let value = pending.state.as_str().to_string();
    broker.save_pending(pending).await.unwrap();
    value
}
