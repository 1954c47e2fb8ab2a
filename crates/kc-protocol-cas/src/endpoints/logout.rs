//! Single-logout return endpoint.
//!
//! After the CAS logout page, CAS sends the browser back here with the user
//! session id as `state`.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::events::{errors, BrokerEvent, EventType};
use crate::session::UserSession;
use crate::url::redact;

use super::error_page::{error_page, IDENTITY_PROVIDER_UNEXPECTED_ERROR, SESSION_NOT_ACTIVE};
use super::state::{BrokerSessionProvider, CasState};

/// Query parameters of the logout response.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutResponseParams {
    /// User session id.
    pub state: Option<String>,
}

/// GET handler for the logout response.
///
/// Every failure, an unreadable query included, gives a 400 page and one
/// `LOGOUT_ERROR` event.
pub async fn cas_logout_response<B: BrokerSessionProvider>(
    State(state): State<CasState<B>>,
    Path((realm, alias)): Path<(String, String)>,
    query: Result<Query<LogoutResponseParams>, QueryRejection>,
) -> Response {
    if !state.serves(&realm, &alias) {
        return error_page(StatusCode::NOT_FOUND, IDENTITY_PROVIDER_UNEXPECTED_ERROR);
    }

    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            warn!(realm = %realm, alias = %alias, rejection = %rejection.body_text(), "Unreadable CAS logout response query");
            logout_error(&state, None).await;
            return error_page(StatusCode::BAD_REQUEST, IDENTITY_PROVIDER_UNEXPECTED_ERROR);
        }
    };

    let session_id = params.state.unwrap_or_default();
    let session = if session_id.is_empty() {
        None
    } else {
        match state.broker.get_user_session(&session_id).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Could not load user session");
                None
            }
        }
    };

    let Some(session) = session else {
        error!(session = %redact(&session_id), "No valid user session");
        logout_error(&state, None).await;
        return error_page(StatusCode::BAD_REQUEST, IDENTITY_PROVIDER_UNEXPECTED_ERROR);
    };

    if !session.is_logging_out() {
        error!(session = %redact(&session.id), session_state = ?session.state, "User session in different state");
        logout_error(&state, Some(&session)).await;
        return error_page(StatusCode::BAD_REQUEST, SESSION_NOT_ACTIVE);
    }

    let event = BrokerEvent::builder(EventType::Logout)
        .realm(&state.realm)
        .identity_provider(state.provider.alias())
        .user(session.user_id.to_string())
        .session(&session.id)
        .build();

    match state.broker.finish_logout(session).await {
        Ok(next) => {
            info!(realm = %realm, alias = %alias, "CAS logout completed");
            state.broker.record_event(event).await;
            Redirect::to(&next).into_response()
        }
        Err(e) => {
            error!(error = %e, "Could not finish logout");
            logout_error(&state, None).await;
            error_page(StatusCode::BAD_REQUEST, IDENTITY_PROVIDER_UNEXPECTED_ERROR)
        }
    }
}

async fn logout_error<B: BrokerSessionProvider>(state: &CasState<B>, session: Option<&UserSession>) {
    let mut event = BrokerEvent::builder(EventType::Logout)
        .realm(&state.realm)
        .identity_provider(state.provider.alias());
    if let Some(session) = session {
        event = event.user(session.user_id.to_string()).session(&session.id);
    }
    state
        .broker
        .record_event(event.error(errors::USER_SESSION_NOT_FOUND).build())
        .await;
}
