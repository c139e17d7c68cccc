//! Field-level validation errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DetailMap;

/// Field name to error message mapping returned by `validate()`.
///
/// An empty map means the operation is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Creates an empty set of errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for a field, replacing any earlier message for it.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    /// Builder-style variant of [`add`](Self::add).
    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    /// Records `message` for `field` when `condition` does not hold.
    pub fn check(&mut self, condition: bool, field: impl Into<String>, message: impl Into<String>) {
        if !condition {
            self.add(field, message);
        }
    }

    /// Merges another set of errors into this one.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the message recorded for a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Converts the errors into the map stored on result envelopes.
    pub fn to_detail_map(&self) -> DetailMap {
        self.0
            .iter()
            .map(|(field, message)| (field.clone(), Value::String(message.clone())))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for ValidationErrors
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_means_valid() {
        let errors = ValidationErrors::new();
        assert!(errors.is_empty());
        assert_eq!(errors.len(), 0);
    }

    #[test]
    fn test_check_records_only_failed_conditions() {
        let mut errors = ValidationErrors::new();
        errors.check(true, "name", "required");
        errors.check(false, "color", "unknown color");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("color"), Some("unknown color"));
        assert_eq!(errors.get("name"), None);
    }

    #[test]
    fn test_detail_map_holds_string_values() {
        let errors = ValidationErrors::new().with("name", "required");
        let map = errors.to_detail_map();
        assert_eq!(map["name"], json!("required"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let errors: ValidationErrors = [("id", "must not be empty")].into_iter().collect();
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, json!({ "id": "must not be empty" }));
    }
}
