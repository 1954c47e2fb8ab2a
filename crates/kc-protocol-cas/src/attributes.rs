//! Read helpers over released CAS attributes.
//!
//! These are the only way mappers look at a [`Success`]. Callers that must
//! tell an absent attribute from an empty one use [`Success::has_attribute`].

use crate::types::Success;

/// Returns the values of `name`, or an empty slice if it was not released.
#[must_use]
pub fn get_attribute_values<'a>(success: &'a Success, name: &str) -> &'a [String] {
    success
        .attributes
        .get(name)
        .map_or(&[], Vec::as_slice)
}

/// True iff `name` has exactly one value and it equals `expected`.
#[must_use]
pub fn attribute_equals(success: &Success, name: &str, expected: &str) -> bool {
    matches!(get_attribute_values(success, name), [only] if only == expected)
}

/// The first value, if there is one and it is not empty.
///
/// Later values are ignored even when the first is empty.
#[must_use]
pub fn project_first_non_empty(values: &[String]) -> Option<&str> {
    values
        .first()
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}
