//! HTTP transport for ticket validation.
//!
//! The validator only needs a single GET with a timeout, so the transport is
//! a narrow trait. [`ReqwestCasClient`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{CasError, CasResult};
use crate::parser::DEFAULT_MAX_RESPONSE_BYTES;

/// Bytes of a non-200 body kept for the error log.
pub const MAX_ERROR_BODY_BYTES: usize = 4096;

/// A fully read HTTP response.
///
/// The connection has already been released when this value exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a 200 response with an XML content type.
    #[must_use]
    pub fn xml(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/xml;charset=UTF-8".to_string()),
            body: body.into(),
        }
    }

    /// Creates a response with the given status and a plain-text body.
    #[must_use]
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain".to_string()),
            body: body.into(),
        }
    }

    /// Returns true if the content type is an XML media type.
    #[must_use]
    pub fn is_xml(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let media_type = ct.split(';').next().unwrap_or_default().trim();
            media_type.eq_ignore_ascii_case("application/xml")
                || media_type.eq_ignore_ascii_case("text/xml")
                || media_type.to_ascii_lowercase().ends_with("+xml")
        })
    }
}

/// Performs the outbound validation request.
///
/// Implementations must not retry and must surface a timeout as
/// [`CasError::Transport`] without a status.
#[async_trait]
pub trait CasHttpClient: Send + Sync {
    /// Issues a GET request and reads the whole body.
    async fn get(&self, url: &Url, timeout: Duration) -> CasResult<HttpResponse>;
}

/// [`CasHttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestCasClient {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestCasClient {
    /// Creates a client that does not follow redirects.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> CasResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("kc-protocol-cas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CasError::config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing `reqwest` client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

#[async_trait]
impl CasHttpClient for ReqwestCasClient {
    async fn get(&self, url: &Url, timeout: Duration) -> CasResult<HttpResponse> {
        let mut response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Error bodies are only logged; keep a prefix and drop the rest.
        if status != 200 {
            let mut body = Vec::new();
            while body.len() < MAX_ERROR_BODY_BYTES {
                let Some(chunk) = response
                    .chunk()
                    .await
                    .map_err(|e| transport_error(e, timeout))?
                else {
                    break;
                };
                body.extend_from_slice(&chunk);
            }
            body.truncate(MAX_ERROR_BODY_BYTES);
            return Ok(HttpResponse {
                status,
                content_type,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(too_large(self.max_body_bytes));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(e, timeout))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large(self.max_body_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        let body = String::from_utf8(body)
            .map_err(|e| CasError::malformed(format!("response body is not valid UTF-8: {e}")))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// The request URL carries the ticket, so it is stripped before the error is
/// formatted.
fn transport_error(err: reqwest::Error, timeout: Duration) -> CasError {
    if err.is_timeout() {
        CasError::network(format!("request timed out after {timeout:?}"))
    } else {
        CasError::network(err.without_url().to_string())
    }
}

fn too_large(max: usize) -> CasError {
    CasError::malformed(format!("response body exceeds {max} bytes"))
}
