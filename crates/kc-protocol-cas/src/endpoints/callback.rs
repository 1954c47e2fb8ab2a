//! CAS callback endpoint.
//!
//! CAS redirects the browser here with `ticket` after a login; `state` is the
//! value the broker put into the service URL.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{error, warn};

use crate::error::{CasError, CasResult};
use crate::events::{BrokerEvent, EventType};
use crate::url::redact;

use super::error_page::{error_page, IDENTITY_PROVIDER_UNEXPECTED_ERROR};
use super::state::{BrokerSessionProvider, CasState};

/// Query parameters of the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Service ticket.
    pub ticket: Option<String>,
    /// Broker-issued state.
    pub state: Option<String>,
}

/// GET handler for the CAS callback.
///
/// On success the broker decides where the browser goes next. Every failure
/// produces the same 417 page and one `LOGIN_ERROR` event, including a query
/// string that does not deserialize.
pub async fn cas_callback<B: BrokerSessionProvider>(
    State(state): State<CasState<B>>,
    Path((realm, alias)): Path<(String, String)>,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    if !state.serves(&realm, &alias) {
        return error_page(StatusCode::NOT_FOUND, IDENTITY_PROVIDER_UNEXPECTED_ERROR);
    }

    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            warn!(realm = %realm, alias = %alias, rejection = %rejection.body_text(), "Unreadable CAS callback query");
            return login_failed(&state, &CasError::StateMismatch).await;
        }
    };

    match complete_login(&state, &params).await {
        Ok(next) => Redirect::to(&next).into_response(),
        Err(e) => {
            error!(
                realm = %realm,
                alias = %alias,
                state = %params.state.as_deref().map(redact).unwrap_or_default(),
                error = %e,
                "Failed to complete CAS authentication"
            );
            login_failed(&state, &e).await
        }
    }
}

async fn login_failed<B: BrokerSessionProvider>(state: &CasState<B>, e: &CasError) -> Response {
    let event = BrokerEvent::builder(EventType::Login)
        .realm(&state.realm)
        .identity_provider(state.provider.alias())
        .error(e.event_error())
        .build();
    state.broker.record_event(event).await;
    error_page(StatusCode::EXPECTATION_FAILED, IDENTITY_PROVIDER_UNEXPECTED_ERROR)
}

async fn complete_login<B: BrokerSessionProvider>(
    state: &CasState<B>,
    params: &CallbackParams,
) -> CasResult<String> {
    let presented = params.state.as_deref().filter(|s| !s.is_empty());
    let mut pending = match presented {
        Some(value) => state.broker.take_pending(value).await?,
        None => None,
    };

    let identity = state
        .provider
        .handle_callback(pending.as_mut(), presented, params.ticket.as_deref())
        .await?;
    let pending = pending.ok_or(CasError::StateMismatch)?;

    let username = identity.username.clone();
    let next = state.broker.authenticated(&pending, identity).await?;

    let event = BrokerEvent::builder(EventType::Login)
        .realm(&state.realm)
        .identity_provider(state.provider.alias())
        .user(username)
        .session(&pending.auth_session_id)
        .build();
    state.broker.record_event(event).await;

    Ok(next)
}
