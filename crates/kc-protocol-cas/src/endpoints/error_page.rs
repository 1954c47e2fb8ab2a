//! Generic error page.
//!
//! The browser never learns which check failed; the cause goes to the logs
//! and the audit event only.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Message for every failed brokered login.
pub const IDENTITY_PROVIDER_UNEXPECTED_ERROR: &str =
    "Unexpected error when authenticating with identity provider";

/// Message for a logout response whose session is not logging out.
pub const SESSION_NOT_ACTIVE: &str = "Session not active";

/// Renders the error page.
pub fn error_page(status: StatusCode, message: &str) -> Response {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login Error</title></head>
<body>
<h1>We are sorry...</h1>
<p>{message}</p>
</body>
</html>"#
    );
    (status, Html(html)).into_response()
}
