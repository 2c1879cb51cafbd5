//! docpkg document model
//!
//! Identity and addressing primitives shared by every docpkg crate.
//!
//! # Core Concepts
//!
//! - [`Document`]: JSON object with id extraction and system-property stripping
//! - [`PartitionKeyValue`]: ordered, kind-preserving partition key tuple
//! - [`DocumentKey`]: `(database, container, id, partition key)` address
//! - [`OperationType`]: Delete/Create/Upsert/Patch, in that rank order
//! - [`PartitionLocation`]: UUID address of a partition inside a package
//! - [`Profile`]: filter list of document keys
//! - [`DigestBuilder`] / [`ContentHash`]: Blake3 digests of captured ETags
//!
//! # Example
//!
//! ```rust
//! use docpkg_model::{Document, DocumentKey};
//! use serde_json::json;
//!
//! let mut doc = Document::from_value(json!({"id": "i1", "pk": "p1", "_ts": 1})).unwrap();
//! doc.strip_system_properties();
//! let key = DocumentKey::new("shop", "items", doc.id().unwrap(), doc.partition_key(&["/pk"]).unwrap());
//! assert_eq!(key.to_string(), r#"shop/items/i1 ["p1"]"#);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod document;
mod hash;
mod key;
mod location;
mod operation;
mod partition_key;
mod profile;

pub use document::{
    canonical_json, Document, IdentityError, ID_PROPERTY, MAX_ID_BYTES, SYSTEM_PROPERTIES,
};
pub use hash::{ContentHash, DigestBuilder};
pub use key::DocumentKey;
pub use location::{LocationStrategy, PartitionLocation};
pub use operation::{OperationType, UnknownOperation};
pub use partition_key::{PartitionKeyComponent, PartitionKeyValue};
pub use profile::{Profile, ProfileError, ProfileFilter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
