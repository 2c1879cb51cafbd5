//! Live document store contract
//!
//! Engines talk to the live database only through [`DocumentStore`]. Every
//! document call returns a tagged [`StoreOutcome`] so callers can decide per
//! operation which statuses are benign (not-found on delete, conflict on
//! create) instead of intercepting errors. [`StoreError`] is reserved for
//! failures that carry no status at all: transport, authentication, decoding.

use async_trait::async_trait;
use docpkg_model::{Document, DocumentKey};
use serde_json::Value;

/// Boxed source error from a store implementation
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a document call
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// Call succeeded
    Ok {
        /// HTTP-style status code (200, 201, 204)
        status: u16,
        /// Returned document, if the call returns one
        document: Option<Document>,
        /// Entity tag of the stored document
        etag: Option<String>,
    },
    /// No document at the key (404)
    NotFound,
    /// A document already exists at the key (409)
    Conflict,
    /// Any other non-success status
    Failed {
        /// Status code
        status: u16,
        /// Server message
        message: String,
    },
}

impl StoreOutcome {
    /// Status 404
    pub const NOT_FOUND: u16 = 404;
    /// Status 409
    pub const CONFLICT: u16 = 409;

    /// Successful outcome carrying a document
    #[must_use]
    pub fn found(status: u16, document: Document) -> Self {
        let etag = document.etag().map(str::to_string);
        Self::Ok {
            status,
            document: Some(document),
            etag,
        }
    }

    /// Successful outcome without a body
    #[inline]
    #[must_use]
    pub const fn empty(status: u16) -> Self {
        Self::Ok {
            status,
            document: None,
            etag: None,
        }
    }

    /// Status code of this outcome
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Ok { status, .. } | Self::Failed { status, .. } => *status,
            Self::NotFound => Self::NOT_FOUND,
            Self::Conflict => Self::CONFLICT,
        }
    }
}

/// Failures without a meaningful status
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Credentials were rejected
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Response could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Metadata call returned an unexpected status
    #[error("{resource}: unexpected status {status}: {message}")]
    UnexpectedStatus {
        resource: String,
        status: u16,
        message: String,
    },
}

/// One `set` operation of a patch request
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PatchOperation {
    op: &'static str,
    path: String,
    value: Value,
}

impl PatchOperation {
    /// Set a top-level property
    #[must_use]
    pub fn set(property: &str, value: Value) -> Self {
        let escaped = property.replace('~', "~0").replace('/', "~1");
        Self {
            op: "set",
            path: format!("/{escaped}"),
            value,
        }
    }

    /// Set operations for every property of `document` except `id`
    #[must_use]
    pub fn set_all(document: &Document) -> Vec<Self> {
        document
            .properties_without_id()
            .map(|(name, value)| Self::set(name, value.clone()))
            .collect()
    }

    /// JSON pointer of the target property
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Top-level property name addressed by the path
    #[must_use]
    pub fn property(&self) -> String {
        self.path
            .trim_start_matches('/')
            .replace("~1", "/")
            .replace("~0", "~")
    }

    /// Value to set
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Point operations against a live document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Address of the account, recorded as the subject of generated packages
    async fn account_address(&self) -> Result<String, StoreError>;

    /// Partition key paths configured on a container
    async fn partition_key_paths(
        &self,
        database: &str,
        container: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Read a document
    async fn read(&self, key: &DocumentKey) -> Result<StoreOutcome, StoreError>;

    /// Insert a document; `Conflict` if one exists
    async fn create(
        &self,
        key: &DocumentKey,
        document: &Document,
    ) -> Result<StoreOutcome, StoreError>;

    /// Insert or replace a document
    async fn upsert(
        &self,
        key: &DocumentKey,
        document: &Document,
    ) -> Result<StoreOutcome, StoreError>;

    /// Apply set operations to an existing document; `NotFound` if absent
    async fn patch(
        &self,
        key: &DocumentKey,
        operations: &[PatchOperation],
    ) -> Result<StoreOutcome, StoreError>;

    /// Delete a document; `NotFound` if absent
    async fn delete(&self, key: &DocumentKey) -> Result<StoreOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_set_all_skips_id() {
        let doc = Document::from_value(json!({"id": "1", "pk": "a", "v": 2})).unwrap();
        let ops = PatchOperation::set_all(&doc);
        let paths: Vec<_> = ops.iter().map(PatchOperation::path).collect();
        assert_eq!(paths, vec!["/pk", "/v"]);
        assert_eq!(
            serde_json::to_value(&ops[1]).unwrap(),
            json!({"op": "set", "path": "/v", "value": 2})
        );
    }

    #[test]
    fn patch_path_escaping_roundtrips() {
        let op = PatchOperation::set("a/b~c", json!(1));
        assert_eq!(op.path(), "/a~1b~0c");
        assert_eq!(op.property(), "a/b~c");
    }

    #[test]
    fn outcome_status_codes() {
        assert_eq!(StoreOutcome::NotFound.status(), 404);
        assert_eq!(StoreOutcome::Conflict.status(), 409);
        assert_eq!(StoreOutcome::empty(204).status(), 204);
        let doc = Document::from_value(json!({"id": "1", "_etag": "e1"})).unwrap();
        let found = StoreOutcome::found(200, doc);
        assert!(matches!(found, StoreOutcome::Ok { etag: Some(ref e), .. } if e == "e1"));
    }
}
