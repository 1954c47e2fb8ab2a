//! CAS router configuration.

use axum::routing::get;
use axum::Router;

use super::callback::cas_callback;
use super::login::cas_login;
use super::logout::cas_logout_response;
use super::state::{BrokerSessionProvider, CasState};

/// Creates the CAS broker router.
///
/// | Method | Path                                                      | Handler               |
/// |--------|-----------------------------------------------------------|-----------------------|
/// | GET    | `/realms/{realm}/broker/{alias}/login`                    | `cas_login`           |
/// | GET    | `/realms/{realm}/broker/{alias}/endpoint`                 | `cas_callback`        |
/// | GET    | `/realms/{realm}/broker/{alias}/endpoint/logout_response` | `cas_logout_response` |
pub fn cas_router<B: BrokerSessionProvider>() -> Router<CasState<B>> {
    Router::new()
        .route("/realms/{realm}/broker/{alias}/login", get(cas_login::<B>))
        .route("/realms/{realm}/broker/{alias}/endpoint", get(cas_callback::<B>))
        .route(
            "/realms/{realm}/broker/{alias}/endpoint/logout_response",
            get(cas_logout_response::<B>),
        )
}
