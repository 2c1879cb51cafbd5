//! Deploy engine
//!
//! Replays packages against the live store in caller order. Within a package
//! partitions replay by database, container, operation rank and location.
//! The run is not transactional: mutations already applied stay applied when
//! a later document fails.

use crate::context::{replay_order, PackageEntry, RunContext};
use crate::error::CoreError;
use crate::store::{DocumentStore, PatchOperation, StoreOutcome};
use docpkg_model::{DocumentKey, OperationType, Profile, ProfileFilter};
use docpkg_package::Package;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Options for [`deploy`]
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Read instead of mutate and report the status each call would return
    pub dry_run: bool,
    /// Restrict mutations to the listed keys
    pub profile: Option<Profile>,
}

impl DeployOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle dry run
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Restrict to a profile
    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// How a document's operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Call succeeded
    Applied,
    /// Not-found on delete or patch, conflict on create
    Benign,
    /// Key not listed in the profile
    Excluded,
}

/// One replayed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployEntry {
    pub package: PathBuf,
    pub key: DocumentKey,
    pub operation: OperationType,
    /// Live (or synthetic, in dry run) status; `None` when excluded
    pub status: Option<u16>,
    pub outcome: DeployOutcome,
}

/// Result of a deploy run
#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub dry_run: bool,
    /// Entries in replay order
    pub entries: Vec<DeployEntry>,
}

impl DeployReport {
    fn count(&self, outcome: DeployOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    /// Documents whose call succeeded
    #[must_use]
    pub fn applied(&self) -> usize {
        self.count(DeployOutcome::Applied)
    }

    /// Documents that ended in an absorbed status
    #[must_use]
    pub fn benign(&self) -> usize {
        self.count(DeployOutcome::Benign)
    }

    /// Documents skipped by the profile
    #[must_use]
    pub fn excluded(&self) -> usize {
        self.count(DeployOutcome::Excluded)
    }
}

/// Deploy packages in the given order
///
/// # Errors
/// - [`CoreError::DuplicateDeployEntry`] when a `(key, operation)` pair repeats
///   across any of the packages
/// - identity errors naming the partition and index
/// - [`CoreError::UnexpectedStatus`] for statuses the operation cannot absorb
/// - store, package and cancellation errors
pub async fn deploy(
    packages: &[PathBuf],
    store: &dyn DocumentStore,
    options: &DeployOptions,
    cancel: CancellationToken,
) -> Result<DeployReport, CoreError> {
    let mut ctx = RunContext::new(store, cancel);
    let filter = options.profile.as_ref().map(Profile::to_filter);
    let mut report = DeployReport {
        dry_run: options.dry_run,
        entries: Vec::new(),
    };

    for path in packages {
        let mut package = Package::open_read(path)?;
        tracing::info!(package = %path.display(), dry_run = options.dry_run, "deploying package");

        for partition in replay_order(&package)? {
            let entries = ctx.load_partition(&mut package, &partition).await?;
            for entry in entries {
                ctx.check_cancelled()?;
                let deployed = apply(&ctx, &entry, filter.as_ref(), options.dry_run).await?;
                report.entries.push(DeployEntry {
                    package: path.clone(),
                    key: entry.key,
                    operation: entry.operation,
                    status: deployed.0,
                    outcome: deployed.1,
                });
            }
        }
    }

    tracing::info!(
        applied = report.applied(),
        benign = report.benign(),
        excluded = report.excluded(),
        "deploy finished"
    );
    Ok(report)
}

async fn apply(
    ctx: &RunContext<'_>,
    entry: &PackageEntry,
    filter: Option<&ProfileFilter>,
    dry_run: bool,
) -> Result<(Option<u16>, DeployOutcome), CoreError> {
    let key = &entry.key;
    let operation = entry.operation;

    if filter.is_some_and(|f| !f.contains(key)) {
        tracing::debug!(%key, %operation, "not in profile, skipped");
        return Ok((None, DeployOutcome::Excluded));
    }

    let store = ctx.store();
    let outcome = if dry_run {
        let current = ctx.call(store.read(key)).await?;
        simulate(operation, &current)
    } else {
        match operation {
            OperationType::Delete => ctx.call(store.delete(key)).await?,
            OperationType::Create => ctx.call(store.create(key, &entry.document)).await?,
            OperationType::Upsert => ctx.call(store.upsert(key, &entry.document)).await?,
            OperationType::Patch => {
                let operations = PatchOperation::set_all(&entry.document);
                ctx.call(store.patch(key, &operations)).await?
            }
        }
    };

    let status = outcome.status();
    match classify(operation, &outcome) {
        Some(DeployOutcome::Applied) => {
            tracing::info!(%key, %operation, status, "applied");
            Ok((Some(status), DeployOutcome::Applied))
        }
        Some(other) => {
            tracing::warn!(%key, %operation, status, "absorbed benign status");
            Ok((Some(status), other))
        }
        None => {
            let message = match outcome {
                StoreOutcome::Failed { message, .. } => message,
                _ => String::new(),
            };
            Err(CoreError::UnexpectedStatus {
                key: key.clone(),
                operation,
                status,
                message,
            })
        }
    }
}

/// Synthetic outcome of `operation` given the current live read
fn simulate(operation: OperationType, current: &StoreOutcome) -> StoreOutcome {
    let exists = match current {
        StoreOutcome::Ok { .. } => true,
        StoreOutcome::NotFound => false,
        other => return other.clone(),
    };
    match (operation, exists) {
        (OperationType::Delete, true) => StoreOutcome::empty(204),
        (OperationType::Create, true) => StoreOutcome::Conflict,
        (OperationType::Create | OperationType::Upsert, false) => StoreOutcome::empty(201),
        (OperationType::Upsert | OperationType::Patch, true) => StoreOutcome::empty(200),
        (OperationType::Delete | OperationType::Patch, false) => StoreOutcome::NotFound,
    }
}

/// `None` when the outcome is fatal for the operation
fn classify(operation: OperationType, outcome: &StoreOutcome) -> Option<DeployOutcome> {
    match (operation, outcome) {
        (_, StoreOutcome::Ok { .. }) => Some(DeployOutcome::Applied),
        (OperationType::Delete | OperationType::Patch, StoreOutcome::NotFound)
        | (OperationType::Create, StoreOutcome::Conflict) => Some(DeployOutcome::Benign),
        _ => None,
    }
}
