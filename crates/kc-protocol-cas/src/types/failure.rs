//! CAS authentication failure.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure code carried by `<cas:authenticationFailure code="...">`.
///
/// The codes defined by CAS 3.0 have their own variants. CAS servers are
/// free to emit other codes, which are kept verbatim in [`FailureCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureCode {
    /// Not all required request parameters were present.
    InvalidRequest,
    /// The ticket failed validation requirements (e.g. a proxy ticket on
    /// `serviceValidate`).
    InvalidTicketSpec,
    /// The service is not authorized to perform proxy authentication.
    UnauthorizedServiceProxy,
    /// The proxy callback URL is invalid.
    InvalidProxyCallback,
    /// The ticket is unknown, expired or already used.
    InvalidTicket,
    /// The ticket was not issued for the presented service.
    InvalidService,
    /// The CAS server hit an internal error.
    InternalError,
    /// Any code not defined by the protocol.
    Other(String),
}

impl FailureCode {
    /// Returns the wire form of this code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidTicketSpec => "INVALID_TICKET_SPEC",
            Self::UnauthorizedServiceProxy => "UNAUTHORIZED_SERVICE_PROXY",
            Self::InvalidProxyCallback => "INVALID_PROXY_CALLBACK",
            Self::InvalidTicket => "INVALID_TICKET",
            Self::InvalidService => "INVALID_SERVICE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Other(code) => code,
        }
    }
}

impl From<&str> for FailureCode {
    fn from(code: &str) -> Self {
        match code {
            "INVALID_REQUEST" => Self::InvalidRequest,
            "INVALID_TICKET_SPEC" => Self::InvalidTicketSpec,
            "UNAUTHORIZED_SERVICE_PROXY" => Self::UnauthorizedServiceProxy,
            "INVALID_PROXY_CALLBACK" => Self::InvalidProxyCallback,
            "INVALID_TICKET" => Self::InvalidTicket,
            "INVALID_SERVICE" => Self::InvalidService,
            "INTERNAL_ERROR" => Self::InternalError,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for FailureCode {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<FailureCode> for String {
    fn from(code: FailureCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `<cas:authenticationFailure>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure code.
    pub code: FailureCode,
    /// Human-readable description from the CAS server.
    pub description: String,
}

impl Failure {
    /// Creates a failure.
    #[must_use]
    pub fn new(code: impl Into<FailureCode>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}
