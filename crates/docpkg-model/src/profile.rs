//! Profiles
//!
//! A [`Profile`] is a flat list of [`DocumentKey`]s that scopes deploy and
//! snapshot runs to a subset of documents. On disk it is a JSON array of key
//! records.

use crate::key::DocumentKey;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Errors reading or writing profile files
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// IO error
    #[error("io error on profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed profile JSON
    #[error("invalid profile {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Filter list of document keys
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Profile {
    keys: Vec<DocumentKey>,
}

impl Profile {
    /// Create from keys, keeping their order
    #[inline]
    #[must_use]
    pub fn new(keys: Vec<DocumentKey>) -> Self {
        Self { keys }
    }

    /// Keys in file order
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[DocumentKey] {
        &self.keys
    }

    /// Number of keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when the profile lists no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Distinct keys in sorted order
    #[must_use]
    pub fn sorted_unique(&self) -> Vec<DocumentKey> {
        let mut keys = self.keys.clone();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Hash set for membership tests
    #[must_use]
    pub fn to_filter(&self) -> ProfileFilter {
        ProfileFilter {
            keys: self.keys.iter().cloned().collect(),
        }
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ProfileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write as an indented JSON file
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProfileError> {
        let path = path.as_ref();
        let mut json = serde_json::to_vec_pretty(self).map_err(|source| ProfileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        json.push(b'\n');
        std::fs::write(path, json).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl FromIterator<DocumentKey> for Profile {
    fn from_iter<I: IntoIterator<Item = DocumentKey>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Membership view of a profile
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    keys: HashSet<DocumentKey>,
}

impl ProfileFilter {
    /// True when the key is listed
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.keys.contains(key)
    }
}
