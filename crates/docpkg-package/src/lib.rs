//! docpkg package container
//!
//! Read/write access to package archives. No business logic lives here: a
//! package is an ordered list of `(partition metadata, document array)` pairs
//! plus a small property bag.
//!
//! # Layout
//!
//! - `manifest.json`: partition list (location, database, container, operation)
//! - `properties.json`: identifier, version, subject, created, creator
//! - `partitions/<location>.json`: one JSON array per partition
//!
//! # Example
//!
//! ```rust,ignore
//! use docpkg_package::{Package, PackageAccess};
//!
//! let mut package = Package::open("release.zip", PackageAccess::Read)?;
//! for partition in package.partitions()?.to_vec() {
//!     let documents = package.read_documents(&partition)?;
//!     println!("{partition}: {} documents", documents.len());
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod manifest;
mod package;
mod properties;

pub use error::{PackageError, PackageOperation};
pub use manifest::{partition_entry, Manifest, Partition, MANIFEST_ENTRY, PROPERTIES_ENTRY};
pub use package::{Package, PackageAccess, PartitionWriter};
pub use properties::{creator, PackageProperties};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
