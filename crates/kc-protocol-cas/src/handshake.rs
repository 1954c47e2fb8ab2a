//! Login state binding.
//!
//! A login redirect carries a random `state` in the service URL handed to
//! CAS. The broker stores a [`PendingAuthentication`] keyed by that state and
//! takes it out exactly once when the callback arrives. The callback is only
//! validated against CAS when the presented state matches a live record.
//!
//! State travels as a query parameter only; cookies are never consulted.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CasError, CasResult};
use crate::url::{redact, with_state};

/// Random bytes in a generated state.
pub const STATE_BYTES: usize = 32;

/// Opaque value binding a login redirect to its pending authentication.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandshakeState(String);

impl HandshakeState {
    /// Generates a fresh URL-safe state.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; STATE_BYTES];
        rand::rng().fill(&mut bytes[..]);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wraps an existing value.
    #[must_use]
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against a presented value in constant time.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.as_bytes())
    }
}

impl fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandshakeState")
            .field(&redact(&self.0))
            .finish()
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(&self.0))
    }
}

/// Where a login attempt is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakePhase {
    /// Redirect to CAS sent, callback pending.
    Issued,
    /// Callback accepted.
    Consumed,
    /// Callback refused because the state did not match.
    Rejected,
}

/// A login redirect awaiting its CAS callback.
///
/// Owned by the broker's session store from [`Issued`](HandshakePhase::Issued)
/// until the callback takes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthentication {
    /// Broker authentication session this login belongs to.
    pub auth_session_id: String,
    /// State embedded in the service URL.
    pub state: HandshakeState,
    /// Broker callback URL without the state parameter.
    pub callback_url: String,
    /// Where the broker continues after a successful login.
    pub redirect_uri: Option<String>,
    /// Current phase.
    pub phase: HandshakePhase,
    /// When the redirect was issued.
    pub created_at: DateTime<Utc>,
    /// After this instant the callback is refused.
    pub expires_at: DateTime<Utc>,
}

impl PendingAuthentication {
    /// Issues a new pending authentication with a fresh state.
    #[must_use]
    pub fn issue(
        auth_session_id: impl Into<String>,
        callback_url: impl Into<String>,
        lifespan: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            auth_session_id: auth_session_id.into(),
            state: HandshakeState::generate(),
            callback_url: callback_url.into(),
            redirect_uri: None,
            phase: HandshakePhase::Issued,
            created_at: now,
            expires_at: now + lifespan,
        }
    }

    /// Sets the post-login redirect.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// The service URL sent to CAS: the callback plus `state`.
    ///
    /// The validation request must use the same URL.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if the callback URL is invalid.
    pub fn service_url(&self) -> CasResult<Url> {
        with_state(&self.callback_url, self.state.as_str())
    }

    /// Returns true if the callback window has closed.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Checks an inbound callback against the record the broker found.
///
/// Passing `None` for `pending` means the broker had no live record for the
/// presented state. Missing, unknown, expired, already used and mismatched
/// states all produce the same [`CasError::StateMismatch`].
///
/// On success the record moves to [`HandshakePhase::Consumed`]; on failure a
/// found record moves to [`HandshakePhase::Rejected`].
///
/// # Errors
///
/// Returns [`CasError::StateMismatch`] unless the state matches a live
/// record byte for byte.
pub fn verify_callback(
    pending: Option<&mut PendingAuthentication>,
    presented: Option<&str>,
    now: DateTime<Utc>,
) -> CasResult<()> {
    let presented = presented.unwrap_or_default();
    let Some(pending) = pending else {
        return Err(CasError::StateMismatch);
    };

    let matches = pending.state.matches(presented);
    let live = pending.phase == HandshakePhase::Issued && !pending.is_expired_at(now);

    if matches && live && !presented.is_empty() {
        pending.phase = HandshakePhase::Consumed;
        Ok(())
    } else {
        pending.phase = HandshakePhase::Rejected;
        Err(CasError::StateMismatch)
    }
}

/// Byte comparison whose duration depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
