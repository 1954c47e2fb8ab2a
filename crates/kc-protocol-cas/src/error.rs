//! CAS error types.
//!
//! Every failure of a login, validation or logout round trip is one of these
//! variants. The distinctions exist for logs and audit events only; the
//! browser always receives the same generic error page.

use thiserror::Error;

use crate::types::FailureCode;

/// Result type for CAS operations.
pub type CasResult<T> = Result<T, CasError>;

/// CAS protocol errors.
#[derive(Debug, Error)]
pub enum CasError {
    /// The provider configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The CAS server could not be reached, timed out, or answered with a
    /// non-200 status.
    #[error("CAS transport error{}: {detail}", status_suffix(.status))]
    Transport {
        /// HTTP status, if a response was received at all.
        status: Option<u16>,
        /// Response body or a description of the network failure.
        detail: String,
    },

    /// The validation response was not a well-formed CAS `serviceResponse`.
    #[error("malformed CAS response: {0}")]
    MalformedResponse(String),

    /// The CAS server answered with an `authenticationFailure`.
    #[error("CAS rejected the ticket: {code} ({description})")]
    Rejected {
        /// Failure code reported by the CAS server.
        code: FailureCode,
        /// Free-text description reported by the CAS server.
        description: String,
    },

    /// The callback state does not belong to a pending authentication.
    #[error("invalid or expired login state")]
    StateMismatch,

    /// The hosting broker failed to load or store session data.
    #[error("broker error: {0}")]
    Broker(String),
}

impl CasError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a transport error for a non-200 response.
    #[must_use]
    pub fn unexpected_status(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            detail: body.into(),
        }
    }

    /// Creates a transport error for a failure without any HTTP response.
    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            detail: detail.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Checks if this is a transport error.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Checks if the CAS server rejected the ticket.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Checks if this is a state binding failure.
    #[must_use]
    pub const fn is_state_mismatch(&self) -> bool {
        matches!(self, Self::StateMismatch)
    }

    /// Returns the HTTP status for the browser-facing error page.
    ///
    /// Configuration problems are server faults. Everything else collapses
    /// into the single status the broker uses for failed brokered logins.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Configuration(_) | Self::Broker(_) => 500,
            _ => 417,
        }
    }

    /// Returns the audit error code recorded for this failure.
    ///
    /// All variants share one code so that event consumers cannot tell the
    /// checks apart either.
    #[must_use]
    pub const fn event_error(&self) -> &'static str {
        crate::events::errors::IDENTITY_PROVIDER_LOGIN_FAILURE
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}
