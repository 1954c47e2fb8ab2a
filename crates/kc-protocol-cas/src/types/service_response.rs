//! CAS `serviceResponse` document.

use serde::{Deserialize, Serialize};

use super::{Failure, Success};

/// Parsed `<cas:serviceResponse>`.
///
/// Exactly one of success or failure. Documents carrying both or neither
/// never make it past the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceResponse {
    /// `<cas:authenticationSuccess>`.
    Success(Success),
    /// `<cas:authenticationFailure>`.
    Failure(Failure),
}

impl ServiceResponse {
    /// Returns true if this is a successful validation.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the success body, if any.
    #[must_use]
    pub const fn success(&self) -> Option<&Success> {
        match self {
            Self::Success(success) => Some(success),
            Self::Failure(_) => None,
        }
    }

    /// Returns the failure body, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(failure),
            Self::Success(_) => None,
        }
    }

    /// Converts into a `Result`, with the failure as the error.
    ///
    /// # Errors
    ///
    /// Returns the [`Failure`] if the CAS server rejected the ticket.
    pub fn into_result(self) -> Result<Success, Failure> {
        match self {
            Self::Success(success) => Ok(success),
            Self::Failure(failure) => Err(failure),
        }
    }
}
