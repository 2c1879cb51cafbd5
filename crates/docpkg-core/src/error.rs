//! Error types for docpkg engines
//!
//! Provides the run-level taxonomy:
//! - Project parsing and validation failures
//! - Identity failures, located by source file or package partition and index
//! - Duplicate entries at pack time and across deployed packages
//! - Package container, profile and live store failures
//! - Cancellation

use crate::project::ProjectError;
use crate::store::StoreError;
use docpkg_model::{DocumentKey, IdentityError, OperationType, ProfileError};
use docpkg_package::PackageError;
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Project file is malformed or invalid
    #[error("invalid project: {0}")]
    InvalidProject(#[from] ProjectError),

    /// A source file document has no usable identity
    #[error("invalid document at {path}[{index}]")]
    InvalidSourceDocument {
        path: PathBuf,
        index: usize,
        #[source]
        source: IdentityError,
    },

    /// A package document has no usable identity
    #[error("invalid document in {package} partition {partition} at index {index}")]
    InvalidPackageDocument {
        package: PathBuf,
        partition: String,
        index: usize,
        #[source]
        source: IdentityError,
    },

    /// Two identical documents in one pack group
    #[error("duplicate document entry at {path}[{index}] for {database}/{container} ({operation})")]
    DuplicateDocumentEntry {
        database: String,
        container: String,
        operation: OperationType,
        path: PathBuf,
        index: usize,
    },

    /// The same key and operation appear twice in one run
    #[error("duplicate deploy entry {key} ({operation}) in {package}")]
    DuplicateDeployEntry {
        key: DocumentKey,
        operation: OperationType,
        package: PathBuf,
    },

    /// Live store returned a status the operation cannot absorb
    #[error("{operation} {key} failed with status {status}: {message}")]
    UnexpectedStatus {
        key: DocumentKey,
        operation: OperationType,
        status: u16,
        message: String,
    },

    /// Package container error
    #[error("package error: {0}")]
    Package(#[from] PackageError),

    /// Profile file error
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Live store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// IO error on a source file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON source file
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create JSON error for path
    pub fn json_error(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Check if error is a cancellation
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
