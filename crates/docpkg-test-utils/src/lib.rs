//! Testing utilities for the docpkg workspace
//!
//! An in-memory [`DocumentStore`] plus fixture helpers for projects and
//! packages.

#![allow(missing_docs)]

use async_trait::async_trait;
use docpkg_core::{DocumentStore, PatchOperation, StoreError, StoreOutcome};
use docpkg_model::{Document, DocumentKey, LocationStrategy, OperationType};
use docpkg_package::Package;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const ACCOUNT_ADDRESS: &str = "https://memory.documents.test:443/";

#[derive(Debug, Default)]
struct State {
    containers: HashMap<(String, String), Vec<String>>,
    documents: BTreeMap<DocumentKey, Document>,
    failures: HashMap<DocumentKey, u16>,
    mutations: Vec<(OperationType, DocumentKey)>,
    metadata_calls: usize,
    next_etag: u64,
}

impl State {
    fn stamp(&mut self, document: Document) -> Document {
        self.next_etag += 1;
        let mut properties = document.properties().clone();
        properties.insert("_etag".into(), json!(format!("\"{:08x}\"", self.next_etag)));
        properties.insert("_ts".into(), json!(1_700_000_000 + self.next_etag));
        properties.insert("_rid".into(), json!(format!("rid{}", self.next_etag)));
        Document::new(properties)
    }

    fn record(&mut self, operation: OperationType, key: &DocumentKey) -> Option<StoreOutcome> {
        self.mutations.push((operation, key.clone()));
        self.failures.get(key).map(|status| StoreOutcome::Failed {
            status: *status,
            message: "injected failure".into(),
        })
    }
}

/// In-memory live store
///
/// Documents get `_etag`, `_ts` and `_rid` on every write, like a real
/// account. Unknown containers fail metadata calls with 404.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container and its partition key paths
    #[must_use]
    pub fn with_container(self, database: &str, container: &str, paths: &[&str]) -> Self {
        self.lock().containers.insert(
            (database.to_string(), container.to_string()),
            paths.iter().map(|p| (*p).to_string()).collect(),
        );
        self
    }

    /// Insert a live document, returning its key
    ///
    /// # Panics
    /// Panics if the container is unknown or the document has no identity
    pub fn seed(&self, database: &str, container: &str, value: Value) -> DocumentKey {
        let document = Document::from_value(value).expect("seed document must be an object");
        let key = {
            let state = self.lock();
            let paths = state
                .containers
                .get(&(database.to_string(), container.to_string()))
                .expect("seed container must be registered");
            DocumentKey::new(
                database,
                container,
                document.id().expect("seed document must have an id"),
                document.partition_key(paths.as_slice()).expect("seed partition key"),
            )
        };
        let mut state = self.lock();
        let stamped = state.stamp(document);
        state.documents.insert(key.clone(), stamped);
        key
    }

    /// Make every mutation of `key` fail with `status`
    pub fn fail_on(&self, key: &DocumentKey, status: u16) {
        self.lock().failures.insert(key.clone(), status);
    }

    /// Stored document with system properties
    pub fn get(&self, key: &DocumentKey) -> Option<Document> {
        self.lock().documents.get(key).cloned()
    }

    /// Stored document with system properties removed, as JSON
    pub fn get_stripped(&self, key: &DocumentKey) -> Option<Value> {
        self.get(key).map(|mut d| {
            d.strip_system_properties();
            d.into_value()
        })
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutation calls in call order, including failed and benign ones
    pub fn mutations(&self) -> Vec<(OperationType, DocumentKey)> {
        self.lock().mutations.clone()
    }

    /// Number of partition key path lookups served
    pub fn metadata_calls(&self) -> usize {
        self.lock().metadata_calls
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn account_address(&self) -> Result<String, StoreError> {
        Ok(ACCOUNT_ADDRESS.to_string())
    }

    async fn partition_key_paths(
        &self,
        database: &str,
        container: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut state = self.lock();
        state.metadata_calls += 1;
        state
            .containers
            .get(&(database.to_string(), container.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::UnexpectedStatus {
                resource: format!("dbs/{database}/colls/{container}"),
                status: 404,
                message: "container not found".into(),
            })
    }

    async fn read(&self, key: &DocumentKey) -> Result<StoreOutcome, StoreError> {
        Ok(match self.lock().documents.get(key) {
            Some(document) => StoreOutcome::found(200, document.clone()),
            None => StoreOutcome::NotFound,
        })
    }

    async fn create(
        &self,
        key: &DocumentKey,
        document: &Document,
    ) -> Result<StoreOutcome, StoreError> {
        let mut state = self.lock();
        if let Some(failed) = state.record(OperationType::Create, key) {
            return Ok(failed);
        }
        if state.documents.contains_key(key) {
            return Ok(StoreOutcome::Conflict);
        }
        let stored = state.stamp(document.clone());
        state.documents.insert(key.clone(), stored.clone());
        Ok(StoreOutcome::found(201, stored))
    }

    async fn upsert(
        &self,
        key: &DocumentKey,
        document: &Document,
    ) -> Result<StoreOutcome, StoreError> {
        let mut state = self.lock();
        if let Some(failed) = state.record(OperationType::Upsert, key) {
            return Ok(failed);
        }
        let status = if state.documents.contains_key(key) { 200 } else { 201 };
        let stored = state.stamp(document.clone());
        state.documents.insert(key.clone(), stored.clone());
        Ok(StoreOutcome::found(status, stored))
    }

    async fn patch(
        &self,
        key: &DocumentKey,
        operations: &[PatchOperation],
    ) -> Result<StoreOutcome, StoreError> {
        let mut state = self.lock();
        if let Some(failed) = state.record(OperationType::Patch, key) {
            return Ok(failed);
        }
        let Some(current) = state.documents.get(key) else {
            return Ok(StoreOutcome::NotFound);
        };
        let mut properties = current.properties().clone();
        for operation in operations {
            properties.insert(operation.property(), operation.value().clone());
        }
        let stored = state.stamp(Document::new(properties));
        state.documents.insert(key.clone(), stored.clone());
        Ok(StoreOutcome::found(200, stored))
    }

    async fn delete(&self, key: &DocumentKey) -> Result<StoreOutcome, StoreError> {
        let mut state = self.lock();
        if let Some(failed) = state.record(OperationType::Delete, key) {
            return Ok(failed);
        }
        Ok(match state.documents.remove(key) {
            Some(_) => StoreOutcome::empty(204),
            None => StoreOutcome::NotFound,
        })
    }
}

/// Write `value` as pretty JSON at `dir/relative`, creating parents
pub fn write_json(dir: &Path, relative: &str, value: &Value) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path
}

/// Project with a single database, container and operation
pub fn single_operation_project(
    database: &str,
    container: &str,
    operation: &str,
    globs: &[&str],
) -> Value {
    json!({
        "databases": [{
            "name": database,
            "containers": [{
                "name": container,
                "operations": [{ "type": operation, "documents": globs }]
            }]
        }]
    })
}

/// One partition to write with [`write_package`]
pub struct PartitionSpec<'a> {
    pub database: &'a str,
    pub container: &'a str,
    pub operation: OperationType,
    pub documents: Vec<Value>,
}

impl<'a> PartitionSpec<'a> {
    pub fn new(
        database: &'a str,
        container: &'a str,
        operation: OperationType,
        documents: Vec<Value>,
    ) -> Self {
        Self {
            database,
            container,
            operation,
            documents,
        }
    }
}

/// Write a package with deterministic partition locations
pub fn write_package(path: &Path, partitions: &[PartitionSpec<'_>]) -> PathBuf {
    let mut package = Package::create(path).unwrap();
    for p in partitions {
        package
            .write_partition(
                p.database,
                p.container,
                p.operation,
                LocationStrategy::Deterministic,
                &p.documents,
            )
            .unwrap();
    }
    package.properties_mut().unwrap().stamp();
    package.close().unwrap();
    path.to_path_buf()
}

/// Read every partition of a package as `(partition, documents)`
pub fn read_package(path: &Path) -> Vec<(docpkg_package::Partition, Vec<Value>)> {
    let mut package = Package::open_read(path).unwrap();
    let partitions = package.partitions().unwrap().to_vec();
    partitions
        .into_iter()
        .map(|p| {
            let docs = package.read_documents(&p).unwrap();
            (p, docs)
        })
        .collect()
}
