//! Pack engine
//!
//! Compiles a project and its source files into a package. Groups are
//! written in ordinal `(database, container, operation)` order with
//! deterministic partition locations, so rebuilding the same inputs yields
//! the same manifest.

use crate::context::discard_output;
use crate::error::CoreError;
use crate::inspect::PartitionSummary;
use crate::project::{group_sources, Project, SourceGroups, VERSION_VARIABLE};
use docpkg_model::{Document, LocationStrategy};
use docpkg_package::{Package, PackageProperties};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Options for [`pack`]
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Package version, also exposed to globs as `$(version)`
    pub version: Option<String>,
    /// Additional glob substitution variables
    pub variables: BTreeMap<String, String>,
}

impl PackOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the package version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a substitution variable
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    fn resolved_variables(&self) -> BTreeMap<String, String> {
        let mut variables = self.variables.clone();
        if let Some(version) = &self.version {
            variables.insert(VERSION_VARIABLE.to_string(), version.clone());
        }
        variables
    }
}

/// Result of a pack run
#[derive(Debug, Clone)]
pub struct PackReport {
    /// Output package path
    pub path: PathBuf,
    /// Properties written to the package
    pub properties: PackageProperties,
    /// Written partitions in manifest order
    pub partitions: Vec<PartitionSummary>,
}

impl PackReport {
    /// Total number of packed documents
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.partitions.iter().map(|p| p.documents).sum()
    }
}

/// Pack a project into `output`
///
/// The project and its sources are resolved before `output` is touched. Once
/// the package is created, the partial output is deleted on any failure.
///
/// # Errors
/// - [`CoreError::InvalidProject`] for malformed or invalid projects
/// - [`CoreError::InvalidSourceDocument`] when a document lacks a usable id
/// - [`CoreError::DuplicateDocumentEntry`] for deep-equal documents in one group
/// - IO, JSON, package and cancellation errors
pub async fn pack(
    project_path: &Path,
    output: &Path,
    options: &PackOptions,
    cancel: &CancellationToken,
) -> Result<PackReport, CoreError> {
    let project = Project::load(project_path)?;
    let base_dir = project_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let sources = project.sources(base_dir, &options.resolved_variables())?;
    tracing::info!(
        project = %project_path.display(),
        sources = sources.len(),
        "packing project"
    );

    let package = Package::create(output)?;
    let result = pack_into(package, group_sources(sources), output, options, cancel).await;
    if let Err(e) = &result {
        discard_output(output, e);
    }
    result
}

async fn pack_into(
    mut package: Package,
    groups: SourceGroups,
    output: &Path,
    options: &PackOptions,
    cancel: &CancellationToken,
) -> Result<PackReport, CoreError> {
    let mut partitions = Vec::new();

    for ((database, container, operation), paths) in groups {
        let mut documents: Vec<Value> = Vec::new();
        let mut seen = HashSet::new();

        for path in &paths {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| CoreError::io_error(path, e))?;
            let values: Vec<Value> =
                serde_json::from_slice(&bytes).map_err(|e| CoreError::json_error(path, e))?;

            for (index, value) in values.into_iter().enumerate() {
                if value == Value::Null {
                    continue;
                }
                let invalid = |source| CoreError::InvalidSourceDocument {
                    path: path.clone(),
                    index,
                    source,
                };
                let mut document = Document::from_value(value).map_err(invalid)?;
                document.id().map_err(invalid)?;
                document.strip_system_properties();

                if !seen.insert(document.canonical()) {
                    return Err(CoreError::DuplicateDocumentEntry {
                        database,
                        container,
                        operation,
                        path: path.clone(),
                        index,
                    });
                }
                documents.push(document.into_value());
            }
        }

        let partition = package.write_partition(
            &database,
            &container,
            operation,
            LocationStrategy::Deterministic,
            &documents,
        )?;
        tracing::info!(%partition, documents = documents.len(), "packed partition");
        partitions.push(PartitionSummary {
            partition,
            documents: documents.len(),
        });
    }

    let properties = package.properties_mut()?;
    properties.stamp();
    properties.version = options.version.clone();
    let properties = properties.clone();
    package.close()?;

    Ok(PackReport {
        path: output.to_path_buf(),
        properties,
        partitions,
    })
}
