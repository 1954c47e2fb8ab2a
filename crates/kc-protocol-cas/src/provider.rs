//! The CAS identity provider.
//!
//! Ties URL building, state binding, ticket validation and mappers together
//! behind the operations the broker calls.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{CasHttpClient, ReqwestCasClient};
use crate::config::CasIdentityProviderConfig;
use crate::error::{CasError, CasResult};
use crate::handshake::{verify_callback, PendingAuthentication};
use crate::identity::{BrokeredIdentity, LocalUser};
use crate::mapper::mapper_for;
use crate::parser::ServiceResponseParser;
use crate::session::UserSession;
use crate::types::{params, FailureCode};
use crate::url::{build_login_url, build_logout_url, redact};
use crate::validator::TicketValidator;

/// Path segment of the broker callback.
pub const ENDPOINT_PATH: &str = "endpoint";
/// Path segment of the single-logout return endpoint, below the callback.
pub const LOGOUT_RESPONSE_PATH: &str = "logout_response";

/// A configured CAS identity provider.
#[derive(Debug, Clone)]
pub struct CasIdentityProvider {
    config: Arc<CasIdentityProviderConfig>,
    validator: TicketValidator,
}

impl CasIdentityProvider {
    /// Creates a provider with its own HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if the configuration is invalid or
    /// the HTTP client cannot be created.
    pub fn new(config: CasIdentityProviderConfig) -> CasResult<Self> {
        let client = ReqwestCasClient::new()?;
        Self::with_client(config, Arc::new(client))
    }

    /// Creates a provider that validates through `client`.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if the configuration is invalid.
    pub fn with_client(
        config: CasIdentityProviderConfig,
        client: Arc<dyn CasHttpClient>,
    ) -> CasResult<Self> {
        config.validate()?;
        for mapper in &config.mappers {
            if mapper_for(&mapper.mapper_type).is_none() {
                warn!(
                    alias = %config.alias,
                    mapper = %mapper.name,
                    mapper_type = %mapper.mapper_type,
                    "Unknown mapper type will be ignored"
                );
            }
        }

        Ok(Self {
            config: Arc::new(config),
            validator: TicketValidator::new(client, ServiceResponseParser::new()),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CasIdentityProviderConfig {
        &self.config
    }

    /// Returns the provider alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    /// Builds the CAS login redirect for a pending authentication.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if a URL cannot be built.
    pub fn perform_login(&self, pending: &PendingAuthentication) -> CasResult<Url> {
        let service = pending.service_url()?;
        let url = build_login_url(&self.config, service.as_str())?;
        debug!(
            alias = %self.config.alias,
            auth_session = %pending.auth_session_id,
            state = %pending.state,
            "Redirecting to CAS login"
        );
        Ok(url)
    }

    /// Completes a CAS callback.
    ///
    /// `pending` is the record the broker took out for `state`, if any. The
    /// state is checked before anything else; on mismatch no request is
    /// made to CAS.
    ///
    /// # Errors
    ///
    /// - [`CasError::StateMismatch`] if the state does not match a live record
    /// - [`CasError::Rejected`] with `INVALID_REQUEST` if no ticket was sent
    /// - any error of [`TicketValidator::validate`]
    pub async fn handle_callback(
        &self,
        pending: Option<&mut PendingAuthentication>,
        state: Option<&str>,
        ticket: Option<&str>,
    ) -> CasResult<BrokeredIdentity> {
        let mut pending = pending;
        verify_callback(pending.as_deref_mut(), state, Utc::now())?;
        let Some(pending) = pending else {
            return Err(CasError::StateMismatch);
        };

        let ticket = ticket.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| {
            CasError::Rejected {
                code: FailureCode::InvalidRequest,
                description: format!("callback did not carry a '{}' parameter", params::TICKET),
            }
        })?;

        let service = pending.service_url()?;
        let success = self
            .validator
            .validate(&self.config, ticket, service.as_str())
            .await?;

        let mut identity = BrokeredIdentity::from_success(success, self.config.alias.clone())
            .with_trust_email(self.config.trust_email)
            .with_auth_session(pending.auth_session_id.clone());

        for mapper in &self.config.mappers {
            if let Some(implementation) = mapper_for(&mapper.mapper_type) {
                implementation.preprocess_federated_identity(mapper, &mut identity);
            }
        }

        info!(
            alias = %self.config.alias,
            user = %identity.username,
            auth_session = %pending.auth_session_id,
            ticket = %redact(ticket),
            "CAS login completed"
        );
        Ok(identity)
    }

    /// Applies all mappers to a user created by this login.
    pub fn import_new_user(&self, user: &mut LocalUser, identity: &BrokeredIdentity) {
        for mapper in &self.config.mappers {
            if let Some(implementation) = mapper_for(&mapper.mapper_type) {
                implementation.import_new_user(mapper, user, identity);
            }
        }
    }

    /// Applies all mappers to an existing user.
    pub fn update_brokered_user(&self, user: &mut LocalUser, identity: &BrokeredIdentity) {
        for mapper in &self.config.mappers {
            if let Some(implementation) = mapper_for(&mapper.mapper_type) {
                implementation.update_brokered_user(mapper, user, identity);
            }
        }
    }

    /// Builds the CAS single-logout redirect for a user session.
    ///
    /// CAS sends the browser back to `logout_response_url` with the session
    /// id as `state`.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if a URL cannot be built.
    pub fn browser_logout_url(
        &self,
        logout_response_url: &Url,
        session: &UserSession,
    ) -> CasResult<Url> {
        let mut service = logout_response_url.clone();
        service
            .query_pairs_mut()
            .append_pair(params::STATE, &session.id);
        let url = build_logout_url(&self.config, service.as_str())?;
        debug!(
            alias = %self.config.alias,
            session = %redact(&session.id),
            "Redirecting to CAS logout"
        );
        Ok(url)
    }

    /// Returns the stored CAS response as the federated token.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Broker`] if the identity cannot be serialized.
    pub fn retrieve_token(&self, identity: &BrokeredIdentity) -> CasResult<String> {
        serde_json::to_string(&identity.cas).map_err(|e| CasError::Broker(e.to_string()))
    }

    /// The broker callback URL for this provider.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if `base_url` is not absolute.
    pub fn callback_url(&self, base_url: &str, realm: &str) -> CasResult<Url> {
        broker_url(base_url, &[realm, &self.config.alias, ENDPOINT_PATH])
    }

    /// The single-logout return URL for this provider.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if `base_url` is not absolute.
    pub fn logout_response_url(&self, base_url: &str, realm: &str) -> CasResult<Url> {
        broker_url(
            base_url,
            &[realm, &self.config.alias, ENDPOINT_PATH, LOGOUT_RESPONSE_PATH],
        )
    }
}

/// `{base}/realms/{realm}/broker/{alias}/...`
fn broker_url(base_url: &str, segments: &[&str]) -> CasResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| CasError::config(format!("invalid base URL '{base_url}': {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| CasError::config(format!("base URL '{base_url}' cannot be a base")))?;
        path.pop_if_empty().push("realms").push(segments[0]).push("broker");
        path.extend(&segments[1..]);
    }
    Ok(url)
}
