//! Package inspection

use crate::error::CoreError;
use docpkg_package::{Package, PackageProperties, Partition};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// One partition with its document count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    pub partition: Partition,
    /// Non-null entries in the partition
    pub documents: usize,
}

/// Properties and partition table of a package
#[derive(Debug, Clone)]
pub struct PackageSummary {
    pub path: PathBuf,
    pub properties: PackageProperties,
    pub partitions: Vec<PartitionSummary>,
}

impl PackageSummary {
    /// Total number of documents across partitions
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.partitions.iter().map(|p| p.documents).sum()
    }
}

/// Read a package's properties and count documents per partition
///
/// # Errors
/// Returns error if the package cannot be opened or a partition is unreadable
pub fn describe_package(path: &Path) -> Result<PackageSummary, CoreError> {
    let mut package = Package::open_read(path)?;
    let mut partitions = Vec::new();
    for partition in package.partitions()?.to_vec() {
        let documents = package
            .read_documents(&partition)?
            .iter()
            .filter(|v| !v.is_null())
            .count();
        partitions.push(PartitionSummary {
            partition,
            documents,
        });
    }
    Ok(PackageSummary {
        path: path.to_path_buf(),
        properties: package.properties().clone(),
        partitions,
    })
}

impl Display for PackageSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let props = &self.properties;
        let field = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

        writeln!(f, "package:    {}", self.path.display())?;
        writeln!(f, "identifier: {}", field(props.identifier.map(|u| u.to_string())))?;
        writeln!(f, "version:    {}", field(props.version.clone()))?;
        writeln!(f, "subject:    {}", field(props.subject.clone()))?;
        writeln!(f, "created:    {}", field(props.created.map(|c| c.to_rfc3339())))?;
        writeln!(f, "creator:    {}", field(props.creator.clone()))?;
        writeln!(f, "partitions: {}", self.partitions.len())?;
        for summary in &self.partitions {
            let p = &summary.partition;
            writeln!(
                f,
                "  {}/{} {:<7} {} ({} documents)",
                p.database(),
                p.container(),
                p.operation(),
                p.location(),
                summary.documents
            )?;
        }
        Ok(())
    }
}

/// JSON rendering of a summary
#[must_use]
pub fn summary_json(summary: &PackageSummary) -> Value {
    serde_json::json!({
        "path": summary.path.display().to_string(),
        "properties": summary.properties,
        "partitions": summary.partitions.iter().map(|s| serde_json::json!({
            "database": s.partition.database(),
            "container": s.partition.container(),
            "operation": s.partition.operation(),
            "location": s.partition.location(),
            "documents": s.documents,
        })).collect::<Vec<_>>(),
    })
}
