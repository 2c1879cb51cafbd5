//! Document identity model
//!
//! [`Document`] wraps a JSON object and knows how to extract its id and
//! partition key, strip database-assigned system properties, and normalize
//! itself for display.

use crate::partition_key::PartitionKeyValue;
use serde_json::{Map, Value};

/// Database-assigned properties that are never packed
pub const SYSTEM_PROPERTIES: [&str; 5] = ["_attachments", "_etag", "_rid", "_self", "_ts"];

/// Name of the identity property
pub const ID_PROPERTY: &str = "id";

/// Maximum UTF-8 length of a document id
pub const MAX_ID_BYTES: usize = 1023;

/// Errors extracting identity from a document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// `id` is absent or not a string
    #[error("document has no string 'id' property")]
    MissingId,

    /// `id` breaks the id rules
    #[error("invalid document id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },

    /// A partition key path resolved to an object or array
    #[error("partition key path '{path}' does not resolve to a scalar value")]
    UnsupportedPartitionKeyShape { path: String },

    /// Value is not a JSON object
    #[error("document is not a JSON object")]
    NotAnObject,
}

/// A schemaless JSON document
///
/// Property order is preserved.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Wrap a JSON object
    #[inline]
    #[must_use]
    pub fn new(properties: Map<String, Value>) -> Self {
        Self(properties)
    }

    /// Wrap an arbitrary JSON value
    ///
    /// # Errors
    /// Returns [`IdentityError::NotAnObject`] unless the value is an object
    pub fn from_value(value: Value) -> Result<Self, IdentityError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(IdentityError::NotAnObject),
        }
    }

    /// Extract and validate the document id
    ///
    /// # Errors
    /// - [`IdentityError::MissingId`] if `id` is absent or not a string
    /// - [`IdentityError::InvalidId`] if it is empty, too long, or contains
    ///   `/` or `\`
    pub fn id(&self) -> Result<&str, IdentityError> {
        let id = self
            .0
            .get(ID_PROPERTY)
            .and_then(Value::as_str)
            .ok_or(IdentityError::MissingId)?;
        validate_id(id)?;
        Ok(id)
    }

    /// Extract the partition key for the given paths
    ///
    /// # Errors
    /// See [`PartitionKeyValue::extract`]
    #[inline]
    pub fn partition_key<P: AsRef<str>>(
        &self,
        paths: &[P],
    ) -> Result<PartitionKeyValue, IdentityError> {
        PartitionKeyValue::extract(&self.0, paths)
    }

    /// Remove system properties in place
    ///
    /// Idempotent; the order of remaining properties is kept.
    pub fn strip_system_properties(&mut self) {
        self.0.retain(|name, _| !SYSTEM_PROPERTIES.contains(&name.as_str()));
    }

    /// Copy with `id` moved to the first position
    ///
    /// Purely cosmetic and idempotent.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut ordered = Map::with_capacity(self.0.len());
        if let Some(id) = self.0.get(ID_PROPERTY) {
            ordered.insert(ID_PROPERTY.to_string(), id.clone());
        }
        for (name, value) in &self.0 {
            if name != ID_PROPERTY {
                ordered.insert(name.clone(), value.clone());
            }
        }
        Self(ordered)
    }

    /// Deep equality ignoring property order
    #[inline]
    #[must_use]
    pub fn content_eq(&self, other: &Self) -> bool {
        canonical_json(&self.to_value()) == canonical_json(&other.to_value())
    }

    /// Canonical serialization with recursively sorted object keys
    #[must_use]
    pub fn canonical(&self) -> String {
        canonical_json(&self.to_value())
    }

    /// Property lookup
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Etag assigned by the database, if present
    #[inline]
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.0.get("_etag").and_then(Value::as_str)
    }

    /// Underlying properties
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Iterate properties other than `id`
    pub fn properties_without_id(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(name, _)| name.as_str() != ID_PROPERTY)
    }

    /// Clone into a JSON value
    #[inline]
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Consume into a JSON value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        document.into_value()
    }
}

impl TryFrom<Value> for Document {
    type Error = IdentityError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn validate_id(id: &str) -> Result<(), IdentityError> {
    let reason = if id.is_empty() {
        "id must not be empty"
    } else if id.len() > MAX_ID_BYTES {
        "id exceeds 1023 bytes"
    } else if id.contains('/') || id.contains('\\') {
        "id must not contain '/' or '\\'"
    } else {
        return Ok(());
    };
    Err(IdentityError::InvalidId {
        id: id.to_string(),
        reason,
    })
}

/// Serialize a JSON value with object keys sorted at every level
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), sorted(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn id_extraction() {
        assert_eq!(doc(json!({"id": "a1"})).id().unwrap(), "a1");
        assert_eq!(doc(json!({"name": "x"})).id(), Err(IdentityError::MissingId));
        assert_eq!(doc(json!({"id": 5})).id(), Err(IdentityError::MissingId));
    }

    #[test]
    fn id_rules() {
        assert!(matches!(doc(json!({"id": ""})).id(), Err(IdentityError::InvalidId { .. })));
        assert!(matches!(doc(json!({"id": "a/b"})).id(), Err(IdentityError::InvalidId { .. })));
        assert!(matches!(doc(json!({"id": "a\\b"})).id(), Err(IdentityError::InvalidId { .. })));
        let long = "x".repeat(MAX_ID_BYTES + 1);
        assert!(matches!(doc(json!({"id": long})).id(), Err(IdentityError::InvalidId { .. })));
        let max = "x".repeat(MAX_ID_BYTES);
        assert!(doc(json!({"id": max})).id().is_ok());
    }

    #[test]
    fn strip_removes_system_properties_and_keeps_order() {
        let mut d = doc(json!({
            "_rid": "r", "id": "1", "_self": "s", "b": 1, "_etag": "e",
            "a": 2, "_attachments": "att", "_ts": 5
        }));
        d.strip_system_properties();
        let names: Vec<_> = d.properties().keys().cloned().collect();
        assert_eq!(names, vec!["id", "b", "a"]);

        let once = d.clone();
        d.strip_system_properties();
        assert_eq!(d, once);
    }

    #[test]
    fn normalize_moves_id_first_and_is_idempotent() {
        let d = doc(json!({"b": 1, "id": "x", "a": {"z": 1, "y": 2}}));
        let once = d.normalized();
        let names: Vec<_> = once.properties().keys().cloned().collect();
        assert_eq!(names, vec!["id", "b", "a"]);
        assert_eq!(once.normalized(), once);
        assert_eq!(
            serde_json::to_string(&once.normalized()).unwrap(),
            serde_json::to_string(&once).unwrap()
        );
    }

    #[test]
    fn content_eq_ignores_property_order() {
        let a = doc(json!({"id": "1", "x": {"p": 1, "q": [1, 2]}}));
        let b = doc(json!({"x": {"q": [1, 2], "p": 1}, "id": "1"}));
        let c = doc(json!({"x": {"q": [2, 1], "p": 1}, "id": "1"}));
        assert!(a.content_eq(&b));
        assert!(!a.content_eq(&c));
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert_eq!(Document::from_value(json!([1])), Err(IdentityError::NotAnObject));
        assert_eq!(Document::from_value(json!("x")), Err(IdentityError::NotAnObject));
    }

    #[test]
    fn etag_lookup() {
        assert_eq!(doc(json!({"id": "1", "_etag": "\"0001\""})).etag(), Some("\"0001\""));
        assert_eq!(doc(json!({"id": "1"})).etag(), None);
    }
}
