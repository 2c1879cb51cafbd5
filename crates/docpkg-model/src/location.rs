//! Partition locations
//!
//! Every partition inside a package is addressed by a UUID. Two derivation
//! strategies exist: a content-deterministic one for authored packages, so a
//! rebuild from the same inputs yields identical addressing, and an
//! event-unique one for one-off captures.

use crate::operation::OperationType;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_128;

/// How a partition location is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationStrategy {
    /// Stable hash of `database:container:operation` in UUID v8 layout
    Deterministic,
    /// Fresh time-ordered UUID v7
    Unique,
}

/// Address of a partition inside a package
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct PartitionLocation(Uuid);

impl PartitionLocation {
    /// Derive a location for `(database, container, operation)`
    #[must_use]
    pub fn derive(
        strategy: LocationStrategy,
        database: &str,
        container: &str,
        operation: OperationType,
    ) -> Self {
        match strategy {
            LocationStrategy::Deterministic => Self::deterministic(database, container, operation),
            LocationStrategy::Unique => Self::unique(),
        }
    }

    /// xxh3-128 of `database:container:operation`, version nibble 8, variant `10`
    #[must_use]
    pub fn deterministic(database: &str, container: &str, operation: OperationType) -> Self {
        let name = format!("{database}:{container}:{operation}");
        let bytes = xxh3_128(name.as_bytes()).to_be_bytes();
        Self(Uuid::new_v8(bytes))
    }

    /// Fresh UUID v7
    #[inline]
    #[must_use]
    pub fn unique() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for PartitionLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PartitionLocation {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_location_is_stable() {
        let a = PartitionLocation::deterministic("shop", "items", OperationType::Upsert);
        let b = PartitionLocation::deterministic("shop", "items", OperationType::Upsert);
        assert_eq!(a, b);
        assert_ne!(a, PartitionLocation::deterministic("shop", "items", OperationType::Patch));
        assert_ne!(a, PartitionLocation::deterministic("shop", "orders", OperationType::Upsert));
    }

    #[test]
    fn deterministic_location_has_v8_layout() {
        let loc = PartitionLocation::deterministic("db", "c", OperationType::Delete);
        assert_eq!(loc.as_uuid().get_version_num(), 8);
        assert_eq!(loc.as_uuid().get_variant(), uuid::Variant::RFC4122);
        // variant bits `10` in the top of byte 8
        assert_eq!(loc.as_uuid().as_bytes()[8] & 0xC0, 0x80);
    }

    #[test]
    fn unique_locations_are_v7_and_distinct() {
        let a = PartitionLocation::unique();
        let b = PartitionLocation::unique();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn location_display_roundtrip() {
        let loc = PartitionLocation::derive(
            LocationStrategy::Deterministic,
            "db",
            "c",
            OperationType::Create,
        );
        let parsed: PartitionLocation = loc.to_string().parse().unwrap();
        assert_eq!(parsed, loc);
    }
}
