//! CAS authentication success.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute name to values, in document order per name.
pub type CasAttributes = BTreeMap<String, Vec<String>>;

/// Body of `<cas:authenticationSuccess>`.
///
/// An attribute that was not released is absent from [`Success::attributes`];
/// that is different from an attribute with an empty value list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success {
    /// Authenticated principal (never empty).
    pub user: String,

    /// Released attributes. Repeated elements become multiple values,
    /// kept in the order they appeared.
    #[serde(default)]
    pub attributes: CasAttributes,
}

impl Success {
    /// Creates a success without attributes.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            attributes: CasAttributes::new(),
        }
    }

    /// Appends a value to an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_attribute(name, value);
        self
    }

    /// Appends a value to an attribute, creating it if needed.
    pub fn push_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Checks if the attribute was released at all.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}
