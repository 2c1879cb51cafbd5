//! docpkg engines
//!
//! Compile, replay, compare and capture document packages:
//! - [`pack`] compiles a project into a package
//! - [`deploy`] replays packages against a live store
//! - [`diff`] compares two packages
//! - [`checkpoint`] captures live state into a rollback package
//! - [`snapshot`] captures the documents listed in a profile
//!
//! The live database is reached only through the [`DocumentStore`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use docpkg_core::{deploy, DeployOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(store: &dyn docpkg_core::DocumentStore) -> Result<(), docpkg_core::CoreError> {
//! let packages = vec!["release.zip".into()];
//! let options = DeployOptions::new().with_dry_run(true);
//! let report = deploy(&packages, store, &options, CancellationToken::new()).await?;
//! println!("{} applied, {} benign", report.applied(), report.benign());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod checkpoint;
pub mod context;
pub mod deploy;
pub mod diff;
pub mod error;
pub mod format;
pub mod inspect;
pub mod pack;
pub mod project;
pub mod snapshot;
pub mod store;

pub use checkpoint::{checkpoint, rollback_for, CheckpointReport, KeyState};
pub use context::{replay_order, PackageEntry, RunContext};
pub use deploy::{deploy, DeployEntry, DeployOptions, DeployOutcome, DeployReport};
pub use diff::{diff, DiffEntry, DiffOptions, DiffReport};
pub use error::CoreError;
pub use format::{format_source, format_sources, FormatError, FormatOutcome};
pub use inspect::{describe_package, summary_json, PackageSummary, PartitionSummary};
pub use pack::{pack, PackOptions, PackReport};
pub use project::{Project, ProjectError, ProjectSource};
pub use snapshot::{snapshot, SnapshotReport};
pub use store::{BoxError, DocumentStore, PatchOperation, StoreError, StoreOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
