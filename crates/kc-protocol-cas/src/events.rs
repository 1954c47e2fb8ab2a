//! Broker audit events.
//!
//! Every callback and logout round trip produces exactly one event. Failures
//! carry a generic error code; the detailed cause only goes to the logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit error codes.
pub mod errors {
    /// Any failure of a brokered CAS login.
    pub const IDENTITY_PROVIDER_LOGIN_FAILURE: &str = "identity_provider_login_failure";
    /// Logout response for an unknown or inactive user session.
    pub const USER_SESSION_NOT_FOUND: &str = "user_session_not_found";
}

/// Event types emitted by the CAS broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Brokered login completed.
    Login,
    /// Brokered login failed.
    LoginError,
    /// Single logout completed.
    Logout,
    /// Single logout failed.
    LogoutError,
}

impl EventType {
    /// The failure counterpart of this event type.
    #[must_use]
    pub const fn as_error(self) -> Self {
        match self {
            Self::Login | Self::LoginError => Self::LoginError,
            Self::Logout | Self::LogoutError => Self::LogoutError,
        }
    }
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// An audit record handed to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: EventType,
    /// Outcome.
    pub outcome: EventOutcome,
    /// Realm name.
    pub realm: Option<String>,
    /// Identity provider alias.
    pub identity_provider: Option<String>,
    /// CAS principal or local user id.
    pub user_id: Option<String>,
    /// Authentication or user session id.
    pub session_id: Option<String>,
    /// Error code for failures.
    pub error: Option<String>,
}

impl BrokerEvent {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> BrokerEventBuilder {
        BrokerEventBuilder::new(event_type)
    }

    /// Returns true for failure events.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.outcome, EventOutcome::Failure)
    }
}

/// Builder for [`BrokerEvent`].
#[derive(Debug)]
pub struct BrokerEventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    realm: Option<String>,
    identity_provider: Option<String>,
    user_id: Option<String>,
    session_id: Option<String>,
    error: Option<String>,
}

impl BrokerEventBuilder {
    /// Creates a new builder with a success outcome.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            realm: None,
            identity_provider: None,
            user_id: None,
            session_id: None,
            error: None,
        }
    }

    /// Marks the event as failed. The type switches to its error variant.
    #[must_use]
    pub fn error(mut self, code: impl Into<String>) -> Self {
        self.event_type = self.event_type.as_error();
        self.outcome = EventOutcome::Failure;
        self.error = Some(code.into());
        self
    }

    /// Sets the realm.
    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Sets the identity provider alias.
    #[must_use]
    pub fn identity_provider(mut self, alias: impl Into<String>) -> Self {
        self.identity_provider = Some(alias.into());
        self
    }

    /// Sets the user.
    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the session.
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> BrokerEvent {
        BrokerEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            realm: self.realm,
            identity_provider: self.identity_provider,
            user_id: self.user_id,
            session_id: self.session_id,
            error: self.error,
        }
    }
}
