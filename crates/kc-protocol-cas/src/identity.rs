//! Brokered identity and the local user it is mapped onto.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Success;

/// The identity produced by a successful CAS login, before the broker links
/// it to a local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokeredIdentity {
    /// Federated user id (the CAS principal).
    pub id: String,
    /// Username suggested to the broker (the CAS principal).
    pub username: String,
    /// Email projected by a mapper.
    pub email: Option<String>,
    /// First name projected by a mapper.
    pub first_name: Option<String>,
    /// Last name projected by a mapper.
    pub last_name: Option<String>,
    /// User attributes projected by mappers.
    pub user_attributes: BTreeMap<String, Vec<String>>,
    /// Roles granted by mappers.
    pub roles: BTreeSet<String>,
    /// The validated CAS response.
    pub cas: Success,
    /// Alias of the identity provider that authenticated the user.
    pub identity_provider: String,
    /// Whether the provider's emails are trusted.
    pub trust_email: bool,
    /// Broker authentication session the login belongs to.
    pub auth_session_id: Option<String>,
}

impl BrokeredIdentity {
    /// Creates an identity from a validated ticket.
    #[must_use]
    pub fn from_success(success: Success, identity_provider: impl Into<String>) -> Self {
        Self {
            id: success.user.clone(),
            username: success.user.clone(),
            email: None,
            first_name: None,
            last_name: None,
            user_attributes: BTreeMap::new(),
            roles: BTreeSet::new(),
            cas: success,
            identity_provider: identity_provider.into(),
            trust_email: false,
            auth_session_id: None,
        }
    }

    /// Sets whether emails are trusted.
    #[must_use]
    pub const fn with_trust_email(mut self, trust: bool) -> Self {
        self.trust_email = trust;
        self
    }

    /// Sets the authentication session.
    #[must_use]
    pub fn with_auth_session(mut self, id: impl Into<String>) -> Self {
        self.auth_session_id = Some(id.into());
        self
    }
}

/// A local user as seen by the mappers.
///
/// Setters return whether anything changed so mappers can avoid redundant
/// writes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalUser {
    /// Local user id.
    pub id: Uuid,
    /// Username.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Whether the email is verified.
    pub email_verified: bool,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Custom attributes.
    pub attributes: BTreeMap<String, Vec<String>>,
    /// Granted roles.
    pub roles: BTreeSet<String>,
}

impl LocalUser {
    /// Creates a user with a fresh id.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Sets the email.
    pub fn set_email(&mut self, email: &str) -> bool {
        set_if_changed(&mut self.email, email)
    }

    /// Sets the first name.
    pub fn set_first_name(&mut self, name: &str) -> bool {
        set_if_changed(&mut self.first_name, name)
    }

    /// Sets the last name.
    pub fn set_last_name(&mut self, name: &str) -> bool {
        set_if_changed(&mut self.last_name, name)
    }

    /// Replaces an attribute; an empty list removes it.
    pub fn set_attribute(&mut self, name: &str, values: &[String]) -> bool {
        if values.is_empty() {
            return self.attributes.remove(name).is_some();
        }
        if self.attributes.get(name).is_some_and(|current| current == values) {
            return false;
        }
        self.attributes.insert(name.to_string(), values.to_vec());
        true
    }

    /// Grants a role.
    pub fn grant_role(&mut self, role: &str) -> bool {
        self.roles.insert(role.to_string())
    }

    /// Revokes a role.
    pub fn revoke_role(&mut self, role: &str) -> bool {
        self.roles.remove(role)
    }
}

fn set_if_changed(field: &mut Option<String>, value: &str) -> bool {
    if field.as_deref() == Some(value) {
        return false;
    }
    *field = Some(value.to_string());
    true
}
