//! Snapshot engine
//!
//! Reads the live documents listed in a profile and writes them as one
//! `upsert` partition per container.

use crate::context::{discard_output, RunContext};
use crate::error::CoreError;
use crate::inspect::PartitionSummary;
use crate::store::{DocumentStore, StoreError, StoreOutcome};
use docpkg_model::{DigestBuilder, LocationStrategy, OperationType, Profile};
use docpkg_package::{Package, PackageProperties};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Result of a snapshot run
#[derive(Debug, Clone)]
pub struct SnapshotReport {
    pub path: PathBuf,
    pub properties: PackageProperties,
    /// Profile keys with no live document
    pub missing: usize,
    pub partitions: Vec<PartitionSummary>,
}

impl SnapshotReport {
    /// Number of captured documents
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.partitions.iter().map(|p| p.documents).sum()
    }
}

/// Capture the live documents listed in `profile` into `output`
///
/// # Errors
/// Returns live store, package and cancellation errors. A partially written
/// output is deleted.
pub async fn snapshot(
    profile: &Profile,
    output: &Path,
    store: &dyn DocumentStore,
    cancel: CancellationToken,
) -> Result<SnapshotReport, CoreError> {
    let ctx = RunContext::new(store, cancel);
    let mut digest = DigestBuilder::new();
    let mut groups: BTreeMap<(String, String), Vec<Value>> = BTreeMap::new();
    let mut missing = 0usize;

    // sorted keys give (id, partition key) order within each container
    for key in profile.sorted_unique() {
        ctx.check_cancelled()?;
        match ctx.call(store.read(&key)).await? {
            StoreOutcome::Ok {
                document: Some(mut document),
                etag,
                ..
            } => {
                if let Some(etag) = &etag {
                    digest.update(etag);
                }
                document.strip_system_properties();
                tracing::debug!(%key, "captured");
                groups
                    .entry((key.database().to_string(), key.container().to_string()))
                    .or_default()
                    .push(document.into_value());
            }
            StoreOutcome::NotFound => {
                tracing::debug!(%key, "not found, skipped");
                missing += 1;
            }
            other => {
                return Err(StoreError::UnexpectedStatus {
                    resource: key.to_string(),
                    status: other.status(),
                    message: match other {
                        StoreOutcome::Failed { message, .. } => message,
                        _ => "read returned no document".to_string(),
                    },
                }
                .into());
            }
        }
    }

    let subject = ctx.call(store.account_address()).await?;
    ctx.check_cancelled()?;

    let result = write_snapshot(output, &groups, &digest, subject, missing);
    if let Err(e) = &result {
        discard_output(output, e);
    }
    result
}

fn write_snapshot(
    output: &Path,
    groups: &BTreeMap<(String, String), Vec<Value>>,
    digest: &DigestBuilder,
    subject: String,
    missing: usize,
) -> Result<SnapshotReport, CoreError> {
    let mut package = Package::create(output)?;
    let mut partitions = Vec::with_capacity(groups.len());
    for ((database, container), documents) in groups {
        let partition = package.write_partition(
            database,
            container,
            OperationType::Upsert,
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

    let report = SnapshotReport {
        path: output.to_path_buf(),
        properties,
        missing,
        partitions,
    };
    tracing::info!(
        path = %output.display(),
        documents = report.document_count(),
        missing,
        "wrote snapshot"
    );
    Ok(report)
}
