//! Session handlers owned by the server.
//!
//! The protocol crate finishes a logout when CAS sends the browser back;
//! starting one, exposing the stored token and the landing pages live here.

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use kc_protocol_cas::endpoints::{
    error_page, BrokerSessionProvider, IDENTITY_PROVIDER_UNEXPECTED_ERROR, SESSION_NOT_ACTIVE,
};
use kc_protocol_cas::events::{errors, BrokerEvent, EventType};
use kc_protocol_cas::session::{UserSession, UserSessionState};
use kc_protocol_cas::url::redact;
use kc_protocol_cas::CasResult;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use url::Url;

use crate::state::AppState;

/// Query parameters naming a user session.
#[derive(Debug, Default, Deserialize)]
pub struct SessionParams {
    /// User session id.
    pub session: Option<String>,
}

/// Query parameters of the account page.
#[derive(Debug, Default, Deserialize)]
pub struct AccountParams {
    /// User session id appended after login.
    pub session_state: Option<String>,
}

/// Starts a single logout: marks the session and redirects to CAS.
pub async fn broker_logout(
    State(state): State<AppState>,
    Path((realm, alias)): Path<(String, String)>,
    Query(params): Query<SessionParams>,
) -> Response {
    if !state.serves(&realm, &alias) {
        return error_page(StatusCode::NOT_FOUND, IDENTITY_PROVIDER_UNEXPECTED_ERROR);
    }

    let session_id = params.session.unwrap_or_default();
    let Some(session) = state.broker.begin_logout(&session_id) else {
        error!(session = %redact(&session_id), "Logout requested for inactive session");
        let event = BrokerEvent::builder(EventType::Logout)
            .realm(&realm)
            .identity_provider(&alias)
            .error(errors::USER_SESSION_NOT_FOUND)
            .build();
        state.broker.record_event(event).await;
        return error_page(StatusCode::BAD_REQUEST, SESSION_NOT_ACTIVE);
    };

    match logout_redirect(&state, &session) {
        Ok(url) => {
            info!(realm = %realm, alias = %alias, user = %session.username, "Starting CAS logout");
            Redirect::to(url.as_str()).into_response()
        }
        Err(e) => {
            error!(error = %e, "Could not build CAS logout redirect");
            error_page(StatusCode::INTERNAL_SERVER_ERROR, IDENTITY_PROVIDER_UNEXPECTED_ERROR)
        }
    }
}

fn logout_redirect(
    state: &AppState,
    session: &UserSession,
) -> CasResult<Url> {
    let response_url = state
        .provider
        .logout_response_url(&state.config.base_url, &state.config.realm)?;
    state.provider.browser_logout_url(&response_url, session)
}

/// Returns the federated token stored for an active session.
pub async fn broker_token(
    State(state): State<AppState>,
    Path((realm, alias)): Path<(String, String)>,
    Query(params): Query<SessionParams>,
) -> Response {
    if !state.serves(&realm, &alias) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let token = params
        .session
        .as_deref()
        .and_then(|id| state.broker.token_for_session(id));

    match token {
        Some(token) => ([(CONTENT_TYPE, "application/json")], token).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_session" })),
        )
            .into_response(),
    }
}

/// Landing page after a brokered login.
pub async fn account_page(
    State(state): State<AppState>,
    Path(realm): Path<String>,
    Query(params): Query<AccountParams>,
) -> Response {
    if realm != state.config.realm {
        return StatusCode::NOT_FOUND.into_response();
    }

    let session = params
        .session_state
        .as_deref()
        .and_then(|id| state.broker.session(id))
        .filter(|s| s.state == UserSessionState::Active);

    let body = match session {
        Some(session) => format!("<p>Signed in as {}.</p>", escape_html(&session.username)),
        None => "<p>You are not signed in.</p>".to_string(),
    };
    page("Account", &body)
}

/// Landing page after a single logout.
pub async fn logged_out_page(State(state): State<AppState>, Path(realm): Path<String>) -> Response {
    if realm != state.config.realm {
        return StatusCode::NOT_FOUND.into_response();
    }
    page("Logged out", "<p>You are logged out.</p>")
}

fn page(title: &str, body: &str) -> Response {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title></head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>"#
    ))
    .into_response()
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
