//! Document keys
//!
//! Provides [`DocumentKey`], the address of a document slot in the live
//! database.

use crate::partition_key::PartitionKeyValue;
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/// `(database, container, id, partition key)` address of a document
///
/// Immutable once constructed. Ordering is database, container, id
/// (ordinal), then the partition key's string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentKey {
    database_name: String,
    container_name: String,
    document_id: String,
    document_partition_key: PartitionKeyValue,
}

impl DocumentKey {
    /// Create a new key
    #[inline]
    #[must_use]
    pub fn new(
        database: impl Into<String>,
        container: impl Into<String>,
        id: impl Into<String>,
        partition_key: PartitionKeyValue,
    ) -> Self {
        Self {
            database_name: database.into(),
            container_name: container.into(),
            document_id: id.into(),
            document_partition_key: partition_key,
        }
    }

    /// Database name
    #[inline]
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database_name
    }

    /// Container name
    #[inline]
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container_name
    }

    /// Document id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.document_id
    }

    /// Partition key value
    #[inline]
    #[must_use]
    pub fn partition_key(&self) -> &PartitionKeyValue {
        &self.document_partition_key
    }
}

impl Ord for DocumentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.database_name
            .cmp(&other.database_name)
            .then_with(|| self.container_name.cmp(&other.container_name))
            .then_with(|| self.document_id.cmp(&other.document_id))
            .then_with(|| {
                self.document_partition_key
                    .to_string()
                    .cmp(&other.document_partition_key.to_string())
            })
    }
}

impl PartialOrd for DocumentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {}",
            self.database_name, self.container_name, self.document_id, self.document_partition_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition_key::PartitionKeyComponent;

    #[test]
    fn signed_zero_keys_agree_on_eq_and_ord() {
        use std::collections::{BTreeSet, HashSet};
        let key = |n: f64| {
            DocumentKey::new("shop", "items", "1", PartitionKeyValue::new(vec![PartitionKeyComponent::Number(n)]))
        };
        assert_eq!(key(-0.0), key(0.0));
        assert_eq!(key(-0.0).cmp(&key(0.0)), Ordering::Equal);
        assert_eq!(BTreeSet::from([key(-0.0), key(0.0)]).len(), 1);
        assert_eq!(HashSet::from([key(-0.0), key(0.0)]).len(), 1);
    }

    #[test]
    fn key_serializes_with_profile_field_names() {
        let key = DocumentKey::new("shop", "items", "i1", PartitionKeyValue::single("p1"));
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "databaseName": "shop",
                "containerName": "items",
                "documentId": "i1",
                "documentPartitionKey": ["p1"]
            })
        );
        let back: DocumentKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn key_ordering() {
        let pk = PartitionKeyValue::single;
        let mut keys = vec![
            DocumentKey::new("b", "c", "1", pk("a")),
            DocumentKey::new("a", "d", "1", pk("a")),
            DocumentKey::new("a", "c", "2", pk("a")),
            DocumentKey::new("a", "c", "1", pk("b")),
            DocumentKey::new("a", "c", "1", pk("a")),
        ];
        keys.sort();
        let rendered: Vec<_> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                r#"a/c/1 ["a"]"#,
                r#"a/c/1 ["b"]"#,
                r#"a/c/2 ["a"]"#,
                r#"a/d/1 ["a"]"#,
                r#"b/c/1 ["a"]"#,
            ]
        );
    }

    #[test]
    fn keys_differ_on_undefined_vs_null() {
        let undefined = PartitionKeyValue::new(vec![PartitionKeyComponent::Undefined]);
        let null = PartitionKeyValue::new(vec![PartitionKeyComponent::Null]);
        assert_ne!(
            DocumentKey::new("d", "c", "1", undefined),
            DocumentKey::new("d", "c", "1", null)
        );
    }
}
