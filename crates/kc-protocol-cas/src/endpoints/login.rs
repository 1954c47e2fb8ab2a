//! Login initiation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::error;
use url::Url;
use uuid::Uuid;

use crate::error::CasResult;
use crate::handshake::PendingAuthentication;

use super::error_page::{error_page, IDENTITY_PROVIDER_UNEXPECTED_ERROR};
use super::state::{BrokerSessionProvider, CasState};

/// Query parameters of the login endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    /// Where to continue after the brokered login.
    pub redirect_uri: Option<String>,
}

/// GET handler that starts a brokered login.
///
/// Stores a pending authentication and redirects to the CAS login page.
pub async fn cas_login<B: BrokerSessionProvider>(
    State(state): State<CasState<B>>,
    Path((realm, alias)): Path<(String, String)>,
    Query(params): Query<LoginParams>,
) -> Response {
    if !state.serves(&realm, &alias) {
        return error_page(StatusCode::NOT_FOUND, IDENTITY_PROVIDER_UNEXPECTED_ERROR);
    }

    match start_login(&state, params).await {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            error!(realm = %realm, alias = %alias, error = %e, "Could not send authentication request to CAS");
            let status = StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_page(status, IDENTITY_PROVIDER_UNEXPECTED_ERROR)
        }
    }
}

async fn start_login<B: BrokerSessionProvider>(
    state: &CasState<B>,
    params: LoginParams,
) -> CasResult<Url> {
    let callback = state.provider.callback_url(&state.base_url, &state.realm)?;
    let mut pending = PendingAuthentication::issue(
        Uuid::new_v4().to_string(),
        callback.as_str(),
        state.auth_session_lifespan,
    );
    if let Some(redirect_uri) = params.redirect_uri {
        pending = pending.with_redirect_uri(redirect_uri);
    }

    let url = state.provider.perform_login(&pending)?;
    state.broker.save_pending(pending).await?;
    Ok(url)
}
