//! Identity provider mappers.
//!
//! Mappers turn released CAS attributes into user properties, attributes and
//! roles. They read the CAS response only through [`crate::attributes`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::attributes::{attribute_equals, get_attribute_values, project_first_non_empty};
use crate::identity::{BrokeredIdentity, LocalUser};

/// Mapper config keys.
pub mod keys {
    /// CAS attribute to read.
    pub const ATTRIBUTE: &str = "attribute";
    /// Expected value for conditional mappers.
    pub const ATTRIBUTE_VALUE: &str = "attribute.value";
    /// Target user property or attribute.
    pub const USER_ATTRIBUTE: &str = "user.attribute";
    /// Role to grant.
    pub const ROLE: &str = "role";
}

const EMAIL: &str = "email";
const FIRST_NAME: &str = "firstName";
const LAST_NAME: &str = "lastName";

/// A mapper instance attached to an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperConfig {
    /// Mapper id.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Mapper type, e.g. [`UserAttributeMapper::ID`].
    pub mapper_type: String,
    /// Mapper settings.
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl MapperConfig {
    /// Creates a mapper config.
    #[must_use]
    pub fn new(name: impl Into<String>, mapper_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            mapper_type: mapper_type.into(),
            config: HashMap::new(),
        }
    }

    /// Adds a config value.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Gets a config value, treating empty strings as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Kind of a mapper config property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Free text.
    String,
    /// A realm or client role.
    Role,
}

/// Describes one config property for the admin UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigProperty {
    /// Config key.
    pub name: &'static str,
    /// Label.
    pub label: &'static str,
    /// Help text.
    pub help_text: &'static str,
    /// Kind.
    pub kind: PropertyKind,
}

/// A mapper that can be attached to a CAS identity provider.
pub trait IdentityProviderMapper: Send + Sync {
    /// Mapper type id.
    fn id(&self) -> &'static str;

    /// Display name.
    fn display_type(&self) -> &'static str;

    /// Display category.
    fn display_category(&self) -> &'static str;

    /// Help text.
    fn help_text(&self) -> &'static str;

    /// Config properties.
    fn config_properties(&self) -> &'static [ConfigProperty];

    /// Adjusts the brokered identity before the broker looks up the user.
    fn preprocess_federated_identity(&self, mapper: &MapperConfig, identity: &mut BrokeredIdentity);

    /// Applies the mapping to a user created by this login.
    fn import_new_user(&self, mapper: &MapperConfig, user: &mut LocalUser, identity: &BrokeredIdentity) {
        self.update_brokered_user(mapper, user, identity);
    }

    /// Applies the mapping to an existing user on a later login.
    fn update_brokered_user(&self, mapper: &MapperConfig, user: &mut LocalUser, identity: &BrokeredIdentity);
}

/// Imports a CAS attribute into a user property or attribute.
///
/// `email`, `firstName` and `lastName` (any case) target the built-in
/// properties and take the first non-empty value. Any other name is stored
/// as a multi-valued user attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAttributeMapper;

impl UserAttributeMapper {
    /// Mapper type id.
    pub const ID: &'static str = "cas-user-attribute-idp-mapper";

    const PROPERTIES: &'static [ConfigProperty] = &[
        ConfigProperty {
            name: keys::ATTRIBUTE,
            label: "Attribute",
            help_text: "Name of attribute to search for in assertion.",
            kind: PropertyKind::String,
        },
        ConfigProperty {
            name: keys::USER_ATTRIBUTE,
            label: "User Attribute Name",
            help_text: "User attribute name to store CAS attribute. Use email, lastName, and firstName to map to those predefined user properties.",
            kind: PropertyKind::String,
        },
    ];
}

impl IdentityProviderMapper for UserAttributeMapper {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn display_type(&self) -> &'static str {
        "Attribute Importer"
    }

    fn display_category(&self) -> &'static str {
        "Attribute Importer"
    }

    fn help_text(&self) -> &'static str {
        "Import declared CAS attribute if it exists in assertion into the specified user property or attribute."
    }

    fn config_properties(&self) -> &'static [ConfigProperty] {
        Self::PROPERTIES
    }

    fn preprocess_federated_identity(&self, mapper: &MapperConfig, identity: &mut BrokeredIdentity) {
        let Some((target, cas_attribute)) = targets(mapper) else {
            debug!(mapper = %mapper.name, "Mapper has no target attribute, skipping");
            return;
        };
        if !identity.cas.has_attribute(cas_attribute) {
            return;
        }

        let values = get_attribute_values(&identity.cas, cas_attribute);
        let first = project_first_non_empty(values).map(str::to_string);
        debug!(mapper = %mapper.name, user_attribute = target, values = values.len(), "Preprocessing CAS attribute");

        if target.eq_ignore_ascii_case(EMAIL) {
            if first.is_some() {
                identity.email = first;
            }
        } else if target.eq_ignore_ascii_case(FIRST_NAME) {
            if first.is_some() {
                identity.first_name = first;
            }
        } else if target.eq_ignore_ascii_case(LAST_NAME) {
            if first.is_some() {
                identity.last_name = first;
            }
        } else {
            identity
                .user_attributes
                .insert(target.to_string(), values.to_vec());
        }
    }

    fn update_brokered_user(&self, mapper: &MapperConfig, user: &mut LocalUser, identity: &BrokeredIdentity) {
        let Some((target, cas_attribute)) = targets(mapper) else {
            debug!(mapper = %mapper.name, "Mapper has no target attribute, skipping");
            return;
        };
        if !identity.cas.has_attribute(cas_attribute) {
            return;
        }

        let values = get_attribute_values(&identity.cas, cas_attribute);
        let first = project_first_non_empty(values);

        let changed = if target.eq_ignore_ascii_case(EMAIL) {
            first.is_some_and(|email| {
                let changed = user.set_email(email);
                if identity.trust_email && !user.email_verified {
                    user.email_verified = true;
                    return true;
                }
                changed
            })
        } else if target.eq_ignore_ascii_case(FIRST_NAME) {
            first.is_some_and(|name| user.set_first_name(name))
        } else if target.eq_ignore_ascii_case(LAST_NAME) {
            first.is_some_and(|name| user.set_last_name(name))
        } else {
            user.set_attribute(target, values)
        };

        if changed {
            debug!(mapper = %mapper.name, user = %user.username, user_attribute = target, "Updated user from CAS attribute");
        }
    }
}

/// Grants a role when a CAS attribute has exactly the configured value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeToRoleMapper;

impl AttributeToRoleMapper {
    /// Mapper type id.
    pub const ID: &'static str = "cas-attribute-to-role-idp-mapper";

    const PROPERTIES: &'static [ConfigProperty] = &[
        ConfigProperty {
            name: keys::ATTRIBUTE,
            label: "Attribute",
            help_text: "Name of attribute to search for in assertion.",
            kind: PropertyKind::String,
        },
        ConfigProperty {
            name: keys::ATTRIBUTE_VALUE,
            label: "Attribute Value",
            help_text: "Value the attribute must have. A multi-valued attribute never matches.",
            kind: PropertyKind::String,
        },
        ConfigProperty {
            name: keys::ROLE,
            label: "Role",
            help_text: "Role to grant to user if the attribute is present.",
            kind: PropertyKind::Role,
        },
    ];

    fn matches(mapper: &MapperConfig, identity: &BrokeredIdentity) -> Option<(bool, String)> {
        let attribute = mapper.get(keys::ATTRIBUTE)?;
        let role = mapper.get(keys::ROLE)?;
        // An explicit empty value matches an empty CAS value; an absent one never matches.
        let expected = mapper.config.get(keys::ATTRIBUTE_VALUE)?;
        Some((
            attribute_equals(&identity.cas, attribute, expected),
            role.to_string(),
        ))
    }
}

impl IdentityProviderMapper for AttributeToRoleMapper {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn display_type(&self) -> &'static str {
        "Attribute to Role"
    }

    fn display_category(&self) -> &'static str {
        "Role Importer"
    }

    fn help_text(&self) -> &'static str {
        "If an attribute exists in the CAS assertion with exactly the configured value, grant the user the specified role."
    }

    fn config_properties(&self) -> &'static [ConfigProperty] {
        Self::PROPERTIES
    }

    fn preprocess_federated_identity(&self, mapper: &MapperConfig, identity: &mut BrokeredIdentity) {
        if let Some((true, role)) = Self::matches(mapper, identity) {
            identity.roles.insert(role);
        }
    }

    fn update_brokered_user(&self, mapper: &MapperConfig, user: &mut LocalUser, identity: &BrokeredIdentity) {
        match Self::matches(mapper, identity) {
            Some((true, role)) => {
                user.grant_role(&role);
            }
            Some((false, role)) => {
                user.revoke_role(&role);
            }
            None => debug!(mapper = %mapper.name, "Role mapper is incomplete, skipping"),
        }
    }
}

/// All mapper types a CAS provider supports.
#[must_use]
pub fn available_mappers() -> [&'static dyn IdentityProviderMapper; 2] {
    [&UserAttributeMapper, &AttributeToRoleMapper]
}

/// Finds a mapper implementation by type id.
#[must_use]
pub fn mapper_for(mapper_type: &str) -> Option<&'static dyn IdentityProviderMapper> {
    available_mappers()
        .into_iter()
        .find(|mapper| mapper.id() == mapper_type)
}

fn targets(mapper: &MapperConfig) -> Option<(&str, &str)> {
    let target = mapper.get(keys::USER_ATTRIBUTE)?;
    let attribute = mapper.config.get(keys::ATTRIBUTE).map_or("", String::as_str);
    Some((target, attribute))
}
