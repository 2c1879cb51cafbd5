//! Package container
//!
//! A [`Package`] is a zip archive holding a JSON manifest, a JSON properties
//! bag and one JSON document array per partition. Packages are opened either
//! read-only or write-only; operations outside the opened access fail with
//! [`PackageError::AccessDenied`].

use crate::error::{PackageError, PackageOperation};
use crate::manifest::{partition_entry, Manifest, Partition, MANIFEST_ENTRY, PROPERTIES_ENTRY};
use crate::properties::PackageProperties;
use docpkg_model::{LocationStrategy, OperationType, PartitionLocation};
use serde_json::Value;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Access a package is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAccess {
    /// Existing package, partitions can be enumerated and read
    Read,
    /// New package, partitions can be created and written
    Write,
}

impl std::fmt::Display for PackageAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Read => "read-only",
            Self::Write => "write-only",
        })
    }
}

enum Archive {
    Reader(ZipArchive<File>),
    Writer(Option<ZipWriter<File>>),
}

/// Portable package archive
pub struct Package {
    path: PathBuf,
    access: PackageAccess,
    archive: Archive,
    manifest: Manifest,
    properties: PackageProperties,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("access", &self.access)
            .field("partitions", &self.manifest.partitions().len())
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl Package {
    /// Open a package
    ///
    /// `Read` opens an existing archive and loads its manifest and properties.
    /// `Write` creates a new archive, truncating any existing file.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or the archive is malformed
    pub fn open(path: impl AsRef<Path>, access: PackageAccess) -> Result<Self, PackageError> {
        let path = path.as_ref().to_path_buf();
        match access {
            PackageAccess::Read => {
                let file = File::open(&path).map_err(|e| PackageError::io_error(&path, e))?;
                let mut archive = ZipArchive::new(file)?;
                let manifest: Manifest = read_json_entry(&mut archive, MANIFEST_ENTRY)?;
                let properties: PackageProperties = read_json_entry(&mut archive, PROPERTIES_ENTRY)?;
                tracing::debug!(
                    path = %path.display(),
                    partitions = manifest.partitions().len(),
                    "opened package"
                );
                Ok(Self {
                    path,
                    access,
                    archive: Archive::Reader(archive),
                    manifest,
                    properties,
                })
            }
            PackageAccess::Write => {
                let file = File::create(&path).map_err(|e| PackageError::io_error(&path, e))?;
                Ok(Self {
                    path,
                    access,
                    archive: Archive::Writer(Some(ZipWriter::new(file))),
                    manifest: Manifest::default(),
                    properties: PackageProperties::default(),
                })
            }
        }
    }

    /// Create a new package for writing
    ///
    /// # Errors
    /// See [`Package::open`]
    #[inline]
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PackageError> {
        Self::open(path, PackageAccess::Write)
    }

    /// Open an existing package for reading
    ///
    /// # Errors
    /// See [`Package::open`]
    #[inline]
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self, PackageError> {
        Self::open(path, PackageAccess::Read)
    }

    /// Package file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Access the package was opened with
    #[inline]
    #[must_use]
    pub fn access(&self) -> PackageAccess {
        self.access
    }

    /// Package properties
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &PackageProperties {
        &self.properties
    }

    /// Mutable package properties
    ///
    /// # Errors
    /// Returns [`PackageError::AccessDenied`] on read-only packages
    pub fn properties_mut(&mut self) -> Result<&mut PackageProperties, PackageError> {
        self.require(PackageAccess::Write, PackageOperation::WriteProperties)?;
        Ok(&mut self.properties)
    }

    /// Partitions listed in the manifest, in write order
    ///
    /// # Errors
    /// Returns [`PackageError::AccessDenied`] on write-only packages
    pub fn partitions(&self) -> Result<&[Partition], PackageError> {
        self.require(PackageAccess::Read, PackageOperation::ReadPartitions)?;
        Ok(self.manifest.partitions())
    }

    /// Start a new partition and return a writer for its document array
    ///
    /// The location is derived from `(database, container, operation)` with the
    /// given strategy. The previous partition writer, if any, must have been
    /// dropped.
    ///
    /// # Errors
    /// - [`PackageError::AccessDenied`] on read-only packages
    /// - [`PackageError::DuplicatePartition`] if the location is taken
    pub fn create_partition(
        &mut self,
        database: &str,
        container: &str,
        operation: OperationType,
        strategy: LocationStrategy,
    ) -> Result<PartitionWriter<'_>, PackageError> {
        self.require(PackageAccess::Write, PackageOperation::CreatePartition)?;
        let location = PartitionLocation::derive(strategy, database, container, operation);
        if self.manifest.contains(&location) {
            return Err(PackageError::DuplicatePartition {
                location,
                database: database.to_string(),
                container: container.to_string(),
                operation,
            });
        }

        let Archive::Writer(Some(writer)) = &mut self.archive else {
            return Err(PackageError::AlreadySaved);
        };
        writer.start_file(partition_entry(&location), entry_options())?;

        let partition = Partition::new(location, database, container, operation);
        self.manifest.push(partition.clone());
        tracing::debug!(%partition, "created partition");
        Ok(PartitionWriter { writer, partition })
    }

    /// Create a partition and write `documents` as its JSON array
    ///
    /// # Errors
    /// See [`Package::create_partition`]; also fails on serialization errors
    pub fn write_partition(
        &mut self,
        database: &str,
        container: &str,
        operation: OperationType,
        strategy: LocationStrategy,
        documents: &[Value],
    ) -> Result<Partition, PackageError> {
        let mut writer = self.create_partition(database, container, operation, strategy)?;
        serde_json::to_writer(&mut writer, documents)?;
        Ok(writer.into_partition())
    }

    /// Reader over a partition's raw bytes
    ///
    /// # Errors
    /// - [`PackageError::AccessDenied`] on write-only packages
    /// - [`PackageError::MissingPartition`] if the archive has no such entry
    pub fn open_partition(&mut self, partition: &Partition) -> Result<impl Read + '_, PackageError> {
        self.require(PackageAccess::Read, PackageOperation::ReadPartitions)?;
        let Archive::Reader(archive) = &mut self.archive else {
            return Err(PackageError::AccessDenied {
                operation: PackageOperation::ReadPartitions,
                access: self.access,
            });
        };
        archive
            .by_name(&partition_entry(partition.location()))
            .map_err(|e| match e {
                zip::result::ZipError::FileNotFound => {
                    PackageError::MissingPartition(*partition.location())
                }
                other => PackageError::Archive(other),
            })
    }

    /// Parse a partition's document array
    ///
    /// Entries are returned as raw JSON values; `null` entries are kept so
    /// callers can report positions by index.
    ///
    /// # Errors
    /// See [`Package::open_partition`]; also fails if the entry is not a JSON array
    pub fn read_documents(&mut self, partition: &Partition) -> Result<Vec<Value>, PackageError> {
        let mut bytes = Vec::new();
        let path = self.path.clone();
        self.open_partition(partition)?
            .read_to_end(&mut bytes)
            .map_err(|e| PackageError::io_error(path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the manifest and properties and finish the archive
    ///
    /// # Errors
    /// - [`PackageError::AccessDenied`] on read-only packages
    /// - [`PackageError::AlreadySaved`] on a second call
    pub fn save(&mut self) -> Result<(), PackageError> {
        self.require(PackageAccess::Write, PackageOperation::WriteProperties)?;
        let Archive::Writer(slot) = &mut self.archive else {
            return Err(PackageError::AlreadySaved);
        };
        let mut writer = slot.take().ok_or(PackageError::AlreadySaved)?;

        writer.start_file(MANIFEST_ENTRY, entry_options())?;
        serde_json::to_writer_pretty(&mut writer, &self.manifest)?;
        writer.start_file(PROPERTIES_ENTRY, entry_options())?;
        serde_json::to_writer_pretty(&mut writer, &self.properties)?;

        let mut file = writer.finish()?;
        file.flush().map_err(|e| PackageError::io_error(&self.path, e))?;
        tracing::debug!(
            path = %self.path.display(),
            partitions = self.manifest.partitions().len(),
            "saved package"
        );
        Ok(())
    }

    /// Close the package, saving it first if it is an unsaved writer
    ///
    /// # Errors
    /// See [`Package::save`]
    pub fn close(mut self) -> Result<(), PackageError> {
        if matches!(self.archive, Archive::Writer(Some(_))) {
            self.save()?;
        }
        Ok(())
    }

    fn require(&self, access: PackageAccess, operation: PackageOperation) -> Result<(), PackageError> {
        if self.access == access {
            Ok(())
        } else {
            Err(PackageError::AccessDenied {
                operation,
                access: self.access,
            })
        }
    }
}

/// Writer for one partition's document array
///
/// Bytes go straight into the archive entry. Drop it before creating the
/// next partition.
pub struct PartitionWriter<'a> {
    writer: &'a mut ZipWriter<File>,
    partition: Partition,
}

impl std::fmt::Debug for PartitionWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionWriter")
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

impl PartitionWriter<'_> {
    /// Metadata of the partition being written
    #[inline]
    #[must_use]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Finish writing and return the partition metadata
    #[inline]
    #[must_use]
    pub fn into_partition(self) -> Partition {
        self.partition
    }
}

impl Write for PartitionWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn entry_options() -> FileOptions {
    // Fixed timestamps keep archive bytes independent of build time
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

fn read_json_entry<T: serde::de::DeserializeOwned>(
    archive: &mut ZipArchive<File>,
    name: &'static str,
) -> Result<T, PackageError> {
    let entry = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => PackageError::MissingEntry(name),
        other => PackageError::Archive(other),
    })?;
    Ok(serde_json::from_reader(entry)?)
}
