//! HTTP router configuration.
//!
//! Combines the CAS broker endpoints with the server's own session pages
//! and health checks.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use kc_protocol_cas::endpoints::cas_router;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::handlers::{account_page, broker_logout, broker_token, logged_out_page};
use crate::state::AppState;

/// Creates the main application router.
///
/// # Routes
///
/// ## CAS broker
/// - `GET /realms/{realm}/broker/{alias}/login` - Start a brokered login
/// - `GET /realms/{realm}/broker/{alias}/endpoint` - CAS callback
/// - `GET /realms/{realm}/broker/{alias}/endpoint/logout_response` - CAS logout return
/// - `GET /realms/{realm}/broker/{alias}/logout` - Start a single logout
/// - `GET /realms/{realm}/broker/{alias}/token` - Stored federated token
///
/// ## Pages
/// - `GET /realms/{realm}/account` - Landing page after login
/// - `GET /realms/{realm}/logged-out` - Landing page after logout
///
/// ## Health
/// - `GET /health` - Health check
/// - `GET /health/live` - Liveness probe
pub fn create_router(state: AppState) -> Router {
    let cas = cas_router().with_state(state.cas_state());

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/realms/{realm}/broker/{alias}/logout", get(broker_logout))
        .route("/realms/{realm}/broker/{alias}/token", get(broker_token))
        .route("/realms/{realm}/account", get(account_page))
        .route("/realms/{realm}/logged-out", get(logged_out_page))
        .with_state(state)
        .merge(cas);

    app.layer(TraceLayer::new_for_http().make_span_with(request_span))
}

/// Request span without the query string, which carries tickets and states.
fn request_span(request: &Request<Body>) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Basic health check.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    })
}

/// Liveness probe.
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}
