//! Checkpoint engine
//!
//! Captures the live state of every document a set of packages is about to
//! touch and writes a rollback package that restores it. The walk mirrors
//! deploy exactly, including the cross-package uniqueness check.
//!
//! Rollback rules per key, with live target `T` and requested operations `S`:
//!
//! | `T`     | `S`                                  | rollback                 |
//! |---------|--------------------------------------|--------------------------|
//! | absent  | has Create or Upsert                 | Delete (source document) |
//! | present | has Delete                           | Upsert `T`               |
//! | present | has Upsert, with Patch or != `T`     | Upsert `T`               |
//! | present | only Patch, a patched value != `T`   | Upsert `T`               |
//!
//! Anything else needs no rollback entry. A patch compares only the
//! properties it sets; unrelated live fields never trigger a rollback.

use crate::context::{discard_output, replay_order, RunContext};
use crate::error::CoreError;
use crate::inspect::PartitionSummary;
use crate::store::{DocumentStore, StoreError, StoreOutcome};
use docpkg_model::{
    canonical_json, DigestBuilder, Document, DocumentKey, LocationStrategy, OperationType,
};
use docpkg_package::{Package, PackageProperties};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Captured state of one key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyState {
    /// Live document before deployment, system properties stripped
    pub target: Option<Document>,
    /// Source document per requested operation
    pub requested: BTreeMap<OperationType, Document>,
}

/// Result of a checkpoint run
#[derive(Debug, Clone)]
pub struct CheckpointReport {
    pub path: PathBuf,
    pub properties: PackageProperties,
    /// Distinct keys whose live state was read
    pub captured: usize,
    pub partitions: Vec<PartitionSummary>,
}

impl CheckpointReport {
    /// Number of rollback documents written
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.partitions.iter().map(|p| p.documents).sum()
    }
}

/// Rollback operation and document for one key, if any
#[must_use]
pub fn rollback_for(state: &KeyState) -> Option<(OperationType, Document)> {
    let requested = &state.requested;
    let Some(target) = &state.target else {
        return requested
            .get(&OperationType::Create)
            .or_else(|| requested.get(&OperationType::Upsert))
            .map(|source| (OperationType::Delete, source.clone()));
    };

    let restore = if requested.contains_key(&OperationType::Delete) {
        true
    } else if let Some(upsert) = requested.get(&OperationType::Upsert) {
        requested.contains_key(&OperationType::Patch) || !upsert.content_eq(target)
    } else if let Some(patch) = requested.get(&OperationType::Patch) {
        patch
            .properties_without_id()
            .any(|(name, value)| differs(target.get(name), value))
    } else {
        false
    };
    restore.then(|| (OperationType::Upsert, target.clone()))
}

fn differs(live: Option<&Value>, patched: &Value) -> bool {
    live.map_or(true, |live| canonical_json(live) != canonical_json(patched))
}

/// Capture live state for `packages` and write a rollback package to `output`
///
/// # Errors
/// Returns the same walk errors as deploy, live read failures, and package
/// write errors. A partially written output is deleted.
pub async fn checkpoint(
    packages: &[PathBuf],
    output: &Path,
    store: &dyn DocumentStore,
    cancel: CancellationToken,
) -> Result<CheckpointReport, CoreError> {
    let mut ctx = RunContext::new(store, cancel);
    let mut states: BTreeMap<DocumentKey, KeyState> = BTreeMap::new();
    let mut digest = DigestBuilder::new();

    for path in packages {
        let mut package = Package::open_read(path)?;
        tracing::info!(package = %path.display(), "capturing live state");
        for partition in replay_order(&package)? {
            for entry in ctx.load_partition(&mut package, &partition).await? {
                if !states.contains_key(&entry.key) {
                    let target = read_target(&ctx, &entry.key, &mut digest).await?;
                    states.insert(
                        entry.key.clone(),
                        KeyState {
                            target,
                            requested: BTreeMap::new(),
                        },
                    );
                }
                if let Some(state) = states.get_mut(&entry.key) {
                    state.requested.insert(entry.operation, entry.document);
                }
            }
        }
    }

    let subject = ctx.call(store.account_address()).await?;
    ctx.check_cancelled()?;

    let result = write_rollback(output, &states, &digest, subject);
    if let Err(e) = &result {
        discard_output(output, e);
    }
    result
}

async fn read_target(
    ctx: &RunContext<'_>,
    key: &DocumentKey,
    digest: &mut DigestBuilder,
) -> Result<Option<Document>, CoreError> {
    match ctx.call(ctx.store().read(key)).await? {
        StoreOutcome::Ok {
            document, etag, ..
        } => {
            if let Some(etag) = &etag {
                digest.update(etag);
            }
            let mut document = document.ok_or_else(|| {
                StoreError::InvalidResponse(format!("read of {key} returned no document"))
            })?;
            document.strip_system_properties();
            tracing::debug!(%key, etag = etag.as_deref().unwrap_or("-"), "captured live document");
            Ok(Some(document))
        }
        StoreOutcome::NotFound => {
            tracing::debug!(%key, "no live document");
            Ok(None)
        }
        other => {
            let status = other.status();
            let message = match other {
                StoreOutcome::Failed { message, .. } => message,
                _ => String::new(),
            };
            Err(StoreError::UnexpectedStatus {
                resource: key.to_string(),
                status,
                message,
            }
            .into())
        }
    }
}

fn write_rollback(
    output: &Path,
    states: &BTreeMap<DocumentKey, KeyState>,
    digest: &DigestBuilder,
    subject: String,
) -> Result<CheckpointReport, CoreError> {
    let mut groups: BTreeMap<(&str, &str, OperationType), Vec<Value>> = BTreeMap::new();
    for (key, state) in states {
        if let Some((operation, document)) = rollback_for(state) {
            tracing::info!(%key, rollback = %operation, "rollback entry");
            groups
                .entry((key.database(), key.container(), operation))
                .or_default()
                .push(document.into_value());
        }
    }

    let mut package = Package::create(output)?;
    let mut partitions = Vec::with_capacity(groups.len());
    for ((database, container, operation), documents) in &groups {
        let partition = package.write_partition(
            database,
            container,
            *operation,
            LocationStrategy::Unique,
            documents,
        )?;
        partitions.push(PartitionSummary {
            partition,
            documents: documents.len(),
        });
    }

    let properties = package.properties_mut()?;
    properties.stamp();
    properties.version = Some(digest.finish().to_string());
    properties.subject = Some(subject);
    let properties = properties.clone();
    package.close()?;

    let report = CheckpointReport {
        path: output.to_path_buf(),
        properties,
        captured: states.len(),
        partitions,
    };
    tracing::info!(
        path = %output.display(),
        captured = report.captured,
        rollbacks = report.rollback_count(),
        "wrote rollback package"
    );
    Ok(report)
}
