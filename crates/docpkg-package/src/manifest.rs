//! Package manifest
//!
//! The manifest is a JSON sidecar listing every partition with its database,
//! container and operation. It is the only index into the archive.

use docpkg_model::{OperationType, PartitionLocation};
use std::cmp::Ordering;

/// Archive entry holding the manifest
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Archive entry holding the package properties
pub const PROPERTIES_ENTRY: &str = "properties.json";

/// Archive entry name for a partition's document array
#[must_use]
pub fn partition_entry(location: &PartitionLocation) -> String {
    format!("partitions/{location}.json")
}

/// A package partition: documents sharing database, container and operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Partition {
    location: PartitionLocation,
    database: String,
    container: String,
    operation: OperationType,
}

impl Partition {
    /// Create partition metadata
    #[inline]
    #[must_use]
    pub fn new(
        location: PartitionLocation,
        database: impl Into<String>,
        container: impl Into<String>,
        operation: OperationType,
    ) -> Self {
        Self {
            location,
            database: database.into(),
            container: container.into(),
            operation,
        }
    }

    /// Location inside the package
    #[inline]
    #[must_use]
    pub fn location(&self) -> &PartitionLocation {
        &self.location
    }

    /// Target database
    #[inline]
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Target container
    #[inline]
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Operation applied to every document
    #[inline]
    #[must_use]
    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Replay order: database, container, operation rank, then location
    #[must_use]
    pub fn replay_cmp(&self, other: &Self) -> Ordering {
        self.database
            .cmp(&other.database)
            .then_with(|| self.container.cmp(&other.container))
            .then_with(|| self.operation.cmp(&other.operation))
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({}) [{}]",
            self.database, self.container, self.operation, self.location
        )
    }
}

/// Partition list stored in the archive
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    partitions: Vec<Partition>,
}

impl Manifest {
    /// Partitions in write order
    #[inline]
    #[must_use]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// True when a partition already uses the location
    #[inline]
    #[must_use]
    pub fn contains(&self, location: &PartitionLocation) -> bool {
        self.partitions.iter().any(|p| &p.location == location)
    }

    pub(crate) fn push(&mut self, partition: Partition) {
        self.partitions.push(partition);
    }
}
