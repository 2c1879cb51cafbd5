//! Error types for the package container

use docpkg_model::{OperationType, PartitionLocation};
use std::path::PathBuf;

/// Requested operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageOperation {
    /// Creating a partition
    CreatePartition,
    /// Enumerating or reading partitions
    ReadPartitions,
    /// Mutating package properties
    WriteProperties,
}

impl std::fmt::Display for PackageOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CreatePartition => "create partition",
            Self::ReadPartitions => "read partitions",
            Self::WriteProperties => "write properties",
        })
    }
}

/// Errors from package container operations
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// The package was not opened with the access this operation needs
    #[error("access denied: cannot {operation} on a {access} package")]
    AccessDenied {
        operation: PackageOperation,
        access: crate::PackageAccess,
    },

    /// A partition with the same derived location already exists
    #[error("duplicate partition {location} for {database}/{container} ({operation})")]
    DuplicatePartition {
        location: PartitionLocation,
        database: String,
        container: String,
        operation: OperationType,
    },

    /// Partition listed in the manifest has no entry in the archive
    #[error("partition {0} is missing from the package")]
    MissingPartition(PartitionLocation),

    /// Required archive entry is missing
    #[error("package entry '{0}' is missing")]
    MissingEntry(&'static str),

    /// Package was already saved
    #[error("package has already been saved")]
    AlreadySaved,

    /// IO error on the package file
    #[error("io error on package {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive format error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Manifest, properties or partition JSON error
    #[error("invalid package content: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
