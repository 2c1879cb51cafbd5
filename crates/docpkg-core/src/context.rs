//! Run-scoped state shared by the live engines
//!
//! One [`RunContext`] exists per command invocation. It owns the partition
//! key path cache and the `(key, operation)` uniqueness set, and races every
//! live call against the run's cancellation token.

use crate::error::CoreError;
use crate::store::{DocumentStore, StoreError};
use docpkg_model::{Document, DocumentKey, OperationType};
use docpkg_package::{Package, Partition};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One document read from a package partition, with its resolved key
#[derive(Debug, Clone)]
pub struct PackageEntry {
    /// Position in the partition's array
    pub index: usize,
    /// Resolved document key
    pub key: DocumentKey,
    /// Operation of the enclosing partition
    pub operation: OperationType,
    /// Document with system properties stripped
    pub document: Document,
}

/// Shared state of one engine run
pub struct RunContext<'a> {
    store: &'a dyn DocumentStore,
    cancel: CancellationToken,
    key_paths: HashMap<(String, String), Arc<[String]>>,
    claimed: HashSet<(DocumentKey, OperationType)>,
}

impl<'a> RunContext<'a> {
    /// Create a context over a live store
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore, cancel: CancellationToken) -> Self {
        Self {
            store,
            cancel,
            key_paths: HashMap::new(),
            claimed: HashSet::new(),
        }
    }

    /// Live store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &'a dyn DocumentStore {
        self.store
    }

    /// Fail with [`CoreError::Cancelled`] once the token fires
    ///
    /// # Errors
    /// Returns `Cancelled` if cancellation was requested
    #[inline]
    pub fn check_cancelled(&self) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Await a live call unless the run is cancelled first
    ///
    /// # Errors
    /// Returns `Cancelled` or the call's own error
    pub async fn call<T, F>(&self, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CoreError::Cancelled),
            result = fut => result.map_err(CoreError::from),
        }
    }

    /// Partition key paths of a container, fetched once per run
    ///
    /// # Errors
    /// Returns error if the metadata call fails
    pub async fn partition_key_paths(
        &mut self,
        database: &str,
        container: &str,
    ) -> Result<Arc<[String]>, CoreError> {
        let cache_key = (database.to_string(), container.to_string());
        if let Some(paths) = self.key_paths.get(&cache_key) {
            return Ok(Arc::clone(paths));
        }
        let store = self.store;
        let paths: Arc<[String]> = self
            .call(store.partition_key_paths(database, container))
            .await?
            .into();
        tracing::debug!(database, container, paths = ?paths, "fetched partition key paths");
        self.key_paths.insert(cache_key, Arc::clone(&paths));
        Ok(paths)
    }

    /// Record a `(key, operation)` pair as seen in this run
    ///
    /// # Errors
    /// Returns [`CoreError::DuplicateDeployEntry`] if the pair was already claimed
    pub fn claim(
        &mut self,
        key: &DocumentKey,
        operation: OperationType,
        package: &Path,
    ) -> Result<(), CoreError> {
        if self.claimed.insert((key.clone(), operation)) {
            Ok(())
        } else {
            Err(CoreError::DuplicateDeployEntry {
                key: key.clone(),
                operation,
                package: package.to_path_buf(),
            })
        }
    }

    /// Forget every claimed pair
    ///
    /// Used where uniqueness is scoped to a single package.
    pub fn clear_claims(&mut self) {
        self.claimed.clear();
    }

    /// Resolve and claim every document of a partition
    ///
    /// `null` entries are skipped. Identity failures name the partition and
    /// index and abort.
    ///
    /// # Errors
    /// Returns identity, uniqueness, package or live store errors
    pub async fn load_partition(
        &mut self,
        package: &mut Package,
        partition: &Partition,
    ) -> Result<Vec<PackageEntry>, CoreError> {
        self.check_cancelled()?;
        let values = package.read_documents(partition)?;
        let paths = self
            .partition_key_paths(partition.database(), partition.container())
            .await?;

        let package_path = package.path().to_path_buf();
        let invalid = |index: usize, source| CoreError::InvalidPackageDocument {
            package: package_path.clone(),
            partition: partition.to_string(),
            index,
            source,
        };

        let mut entries = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            self.check_cancelled()?;
            if value == Value::Null {
                continue;
            }
            let mut document = Document::from_value(value).map_err(|e| invalid(index, e))?;
            document.strip_system_properties();
            let id = document.id().map_err(|e| invalid(index, e))?;
            let partition_key = document.partition_key(&paths[..]).map_err(|e| invalid(index, e))?;
            let key = DocumentKey::new(
                partition.database(),
                partition.container(),
                id,
                partition_key,
            );
            self.claim(&key, partition.operation(), &package_path)?;
            entries.push(PackageEntry {
                index,
                key,
                operation: partition.operation(),
                document,
            });
        }
        Ok(entries)
    }
}

/// Partitions of a package in replay order
///
/// Ordered by database, container, operation rank, then location.
///
/// # Errors
/// Returns error if the package was not opened for reading
pub fn replay_order(package: &Package) -> Result<Vec<Partition>, CoreError> {
    let mut partitions = package.partitions()?.to_vec();
    partitions.sort_by(Partition::replay_cmp);
    Ok(partitions)
}

/// Delete a partially written output file, keeping the original error
pub(crate) fn discard_output(path: &Path, error: &CoreError) {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), %error, "deleted incomplete output");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), "cannot delete incomplete output: {e}");
        }
    }
}
