//! Diff engine
//!
//! Compares the `(key, operation)` document sets of two packages. The live
//! store is only consulted for partition key paths.

use crate::context::{replay_order, RunContext};
use crate::error::CoreError;
use crate::store::DocumentStore;
use docpkg_model::{Document, DocumentKey, OperationType, Profile};
use docpkg_package::Package;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

type DocumentSet = BTreeMap<(DocumentKey, OperationType), Document>;

/// Options for [`diff`]
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Write the created and updated keys to this profile
    pub profile: Option<PathBuf>,
}

impl DiffOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a profile of changed keys
    #[must_use]
    pub fn with_profile(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile = Some(path.into());
        self
    }
}

/// A `(key, operation)` pair reported by a diff
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiffEntry {
    pub key: DocumentKey,
    pub operation: OperationType,
}

impl std::fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.key, self.operation)
    }
}

/// Differences between a left and a right package
///
/// Every list is sorted by database, container, id, partition key and
/// operation rank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// In left, absent from right
    pub created: Vec<DiffEntry>,
    /// In both with different content
    pub updated: Vec<DiffEntry>,
    /// In right, absent from left
    pub deleted: Vec<DiffEntry>,
    /// Profile written, if requested
    pub profile: Option<PathBuf>,
}

impl DiffReport {
    /// True when any list is non-empty
    #[inline]
    #[must_use]
    pub fn has_differences(&self) -> bool {
        !(self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty())
    }

    /// True when exit-code mode should report "differences found"
    ///
    /// Writing a profile consumes the differences, so a run that wrote one
    /// exits cleanly.
    #[inline]
    #[must_use]
    pub fn differences_found(&self) -> bool {
        self.has_differences() && self.profile.is_none()
    }

    /// Distinct keys of created and updated entries, sorted
    #[must_use]
    pub fn changed_keys(&self) -> Vec<DocumentKey> {
        let mut keys: Vec<_> = self
            .updated
            .iter()
            .chain(&self.created)
            .map(|e| e.key.clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Compare `left` against `right`
///
/// # Errors
/// Returns error on unreadable packages, identity failures, a `(key,
/// operation)` pair repeated within one package, or profile write failures
pub async fn diff(
    left: &Path,
    right: &Path,
    store: &dyn DocumentStore,
    options: &DiffOptions,
    cancel: CancellationToken,
) -> Result<DiffReport, CoreError> {
    let mut ctx = RunContext::new(store, cancel);
    let left_set = load(&mut ctx, left).await?;
    let right_set = load(&mut ctx, right).await?;

    let mut report = compare(&left_set, &right_set);
    tracing::info!(
        created = report.created.len(),
        updated = report.updated.len(),
        deleted = report.deleted.len(),
        "diff computed"
    );

    if let Some(path) = &options.profile {
        let profile: Profile = report.changed_keys().into_iter().collect();
        profile.save(path)?;
        tracing::info!(path = %path.display(), keys = profile.len(), "wrote profile");
        report.profile = Some(path.clone());
    }
    Ok(report)
}

async fn load(ctx: &mut RunContext<'_>, path: &Path) -> Result<DocumentSet, CoreError> {
    // duplicates are only fatal within one package
    ctx.clear_claims();
    let mut package = Package::open_read(path)?;
    let mut set = DocumentSet::new();
    for partition in replay_order(&package)? {
        for entry in ctx.load_partition(&mut package, &partition).await? {
            set.insert((entry.key, entry.operation), entry.document);
        }
    }
    tracing::debug!(package = %path.display(), documents = set.len(), "loaded package");
    Ok(set)
}

fn compare(left: &DocumentSet, right: &DocumentSet) -> DiffReport {
    let entry = |(key, operation): &(DocumentKey, OperationType)| DiffEntry {
        key: key.clone(),
        operation: *operation,
    };

    let mut report = DiffReport::default();
    for (pair, document) in left {
        match right.get(pair) {
            None => report.created.push(entry(pair)),
            Some(other) if !document.content_eq(other) => report.updated.push(entry(pair)),
            Some(_) => {}
        }
    }
    report.deleted = right
        .keys()
        .filter(|pair| !left.contains_key(*pair))
        .map(entry)
        .collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpkg_model::PartitionKeyValue;
    use serde_json::json;

    fn set(items: &[(&str, OperationType, serde_json::Value)]) -> DocumentSet {
        items
            .iter()
            .map(|(id, op, value)| {
                let key = DocumentKey::new("db", "c", *id, PartitionKeyValue::single("a"));
                ((key, *op), Document::from_value(value.clone()).unwrap())
            })
            .collect()
    }

    #[test]
    fn writing_a_profile_clears_differences_found() {
        let left = set(&[("1", OperationType::Upsert, json!({"id": "1"}))]);
        let mut report = compare(&left, &DocumentSet::new());
        assert!(report.differences_found());

        report.profile = Some(PathBuf::from("changed.json"));
        assert!(report.has_differences());
        assert!(!report.differences_found());

        assert!(!compare(&left, &left).differences_found());
    }

    #[test]
    fn created_updated_deleted() {
        let left = set(&[
            ("1", OperationType::Upsert, json!({"id": "1", "v": 1})),
            ("2", OperationType::Upsert, json!({"id": "2", "v": 2})),
            ("3", OperationType::Upsert, json!({"v": 3, "id": "3"})),
        ]);
        let right = set(&[
            ("2", OperationType::Upsert, json!({"id": "2", "v": 20})),
            ("3", OperationType::Upsert, json!({"id": "3", "v": 3})),
            ("4", OperationType::Delete, json!({"id": "4"})),
        ]);
        let report = compare(&left, &right);
        let ids = |entries: &[DiffEntry]| -> Vec<String> {
            entries.iter().map(|e| e.key.id().to_string()).collect()
        };
        assert_eq!(ids(&report.created), vec!["1"]);
        assert_eq!(ids(&report.updated), vec!["2"]);
        assert_eq!(ids(&report.deleted), vec!["4"]);
        assert!(report.has_differences());

        let reverse = compare(&right, &left);
        assert_eq!(reverse.created, report.deleted);
        assert_eq!(reverse.deleted, report.created);
    }

    #[test]
    fn same_key_different_operation_is_distinct() {
        let left = set(&[("1", OperationType::Upsert, json!({"id": "1"}))]);
        let right = set(&[("1", OperationType::Patch, json!({"id": "1"}))]);
        let report = compare(&left, &right);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.deleted.len(), 1);
        assert!(report.updated.is_empty());
    }

    #[test]
    fn changed_keys_are_deduplicated() {
        let left = set(&[
            ("1", OperationType::Upsert, json!({"id": "1", "v": 1})),
            ("1", OperationType::Patch, json!({"id": "1", "v": 2})),
        ]);
        let right = set(&[("1", OperationType::Upsert, json!({"id": "1", "v": 0}))]);
        let report = compare(&left, &right);
        assert_eq!(report.changed_keys().len(), 1);
    }

    #[test]
    fn self_diff_is_empty() {
        let a = set(&[("1", OperationType::Create, json!({"id": "1"}))]);
        assert!(!compare(&a, &a).has_differences());
    }
}
