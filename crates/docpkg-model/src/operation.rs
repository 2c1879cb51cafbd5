//! Operation types applied to package documents
//!
//! Provides [`OperationType`], the closed set of per-document operations a
//! partition can carry.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Operation applied to every document of a partition
///
/// The declaration order is the deterministic grouping order used by every
/// engine: `Delete < Create < Upsert < Patch`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Remove the document
    Delete,
    /// Insert the document, leaving an existing one untouched
    Create,
    /// Insert or replace the document
    Upsert,
    /// Set every listed property on an existing document
    Patch,
}

impl OperationType {
    /// All operation types in rank order
    pub const ALL: [Self; 4] = [Self::Delete, Self::Create, Self::Upsert, Self::Patch];

    /// Rank used for deterministic ordering
    #[inline]
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Delete => 0,
            Self::Create => 1,
            Self::Upsert => 2,
            Self::Patch => 3,
        }
    }

    /// Lowercase wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Create => "create",
            Self::Upsert => "upsert",
            Self::Patch => "patch",
        }
    }
}

impl Display for OperationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// Unrecognized operation name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation type: '{0}'")]
pub struct UnknownOperation(pub String);
