//! Service ticket validation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::client::CasHttpClient;
use crate::config::CasIdentityProviderConfig;
use crate::error::{CasError, CasResult};
use crate::parser::ServiceResponseParser;
use crate::types::Success;
use crate::url::{build_validate_url, redact};

/// Exchanges a service ticket for the authenticated principal.
///
/// Makes exactly one request per call. Tickets are single-use, so a failed
/// validation is never retried here.
#[derive(Clone)]
pub struct TicketValidator {
    client: Arc<dyn CasHttpClient>,
    parser: ServiceResponseParser,
}

impl std::fmt::Debug for TicketValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketValidator")
            .field("parser", &self.parser)
            .finish_non_exhaustive()
    }
}

impl TicketValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(client: Arc<dyn CasHttpClient>, parser: ServiceResponseParser) -> Self {
        Self { client, parser }
    }

    /// Validates `ticket` for `service_url`.
    ///
    /// # Errors
    ///
    /// - [`CasError::Configuration`] if the validate URL cannot be built
    /// - [`CasError::Transport`] on network failure, timeout or non-200 status
    /// - [`CasError::MalformedResponse`] if the body is not a valid `serviceResponse`
    /// - [`CasError::Rejected`] if CAS answered with `authenticationFailure`
    pub async fn validate(
        &self,
        config: &CasIdentityProviderConfig,
        ticket: &str,
        service_url: &str,
    ) -> CasResult<Success> {
        let url = build_validate_url(config, ticket, service_url)?;
        debug!(
            alias = %config.alias,
            endpoint = %url.path(),
            ticket = %redact(ticket),
            "Validating CAS service ticket"
        );

        let response = self
            .client
            .get(&url, config.request_timeout)
            .await
            .inspect_err(|e| error!(alias = %config.alias, error = %e, "CAS validation request failed"))?;

        if response.status != 200 {
            error!(
                alias = %config.alias,
                status = response.status,
                body = %response.body,
                "CAS returned a non-200 response"
            );
            return Err(CasError::unexpected_status(response.status, response.body));
        }

        if !response.is_xml() {
            warn!(
                alias = %config.alias,
                content_type = ?response.content_type,
                "CAS validation response is not declared as XML"
            );
        }

        debug!(alias = %config.alias, body = %response.body, "Raw XML from CAS");

        let parsed = self.parser.parse(&response.body).inspect_err(|e| {
            error!(alias = %config.alias, error = %e, "Could not parse CAS validation response");
        })?;

        match parsed.into_result() {
            Ok(success) => {
                info!(
                    alias = %config.alias,
                    user = %success.user,
                    attributes = success.attributes.len(),
                    "CAS ticket validated"
                );
                Ok(success)
            }
            Err(failure) => {
                error!(
                    alias = %config.alias,
                    code = %failure.code,
                    description = %failure.description,
                    "CAS rejected the service ticket"
                );
                Err(CasError::Rejected {
                    code: failure.code,
                    description: failure.description,
                })
            }
        }
    }
}
