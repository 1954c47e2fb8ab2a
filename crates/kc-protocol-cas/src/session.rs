//! User sessions created by brokered CAS logins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserSessionState {
    /// Logged in.
    #[default]
    Active,
    /// Redirected to the CAS logout endpoint, waiting for it to come back.
    /// The session is removed once the round trip completes.
    LoggingOut,
}

/// A broker user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Session id. Also the `state` of the CAS logout round trip.
    pub id: String,
    /// Local user id.
    pub user_id: Uuid,
    /// Username.
    pub username: String,
    /// Alias of the identity provider that created the session.
    pub identity_provider: String,
    /// Current state.
    pub state: UserSessionState,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
}

impl UserSession {
    /// Creates an active session with a fresh id.
    #[must_use]
    pub fn new(user_id: Uuid, username: impl Into<String>, identity_provider: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            username: username.into(),
            identity_provider: identity_provider.into(),
            state: UserSessionState::Active,
            started_at: Utc::now(),
        }
    }

    /// Returns true while the CAS logout round trip is in progress.
    #[must_use]
    pub fn is_logging_out(&self) -> bool {
        self.state == UserSessionState::LoggingOut
    }
}
