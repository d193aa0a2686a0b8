//! Source acquisition
//!
//! Materializes a working tree for a push location in the cache and
//! resolves its HEAD commit. The first run clones; later runs find the
//! directory occupied by a repository and reuse it without touching the
//! network.

mod git;

pub use git::Git2Source;

use crate::cache::CacheStore;
use crate::error::{ShipyardError, ShipyardResult};
use crate::request::{BuildRequest, Credential};
use crate::tag::CommitHash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Parameters for a clone
#[derive(Debug)]
pub struct CloneSpec<'a> {
    pub url: &'a str,
    /// Name the remote is created under
    pub remote_name: &'a str,
    pub credential: &'a Credential,
}

/// Why a clone did not produce a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneFailure {
    /// The destination is already occupied
    AlreadyExists,
    /// The transfer was aborted by cancellation
    Cancelled,
    /// Authentication, network or remote repository failure
    Other(String),
}

/// Version-control operations the acquirer needs
pub trait SourceControl: Send + Sync {
    /// Clone `spec.url` into the empty directory `dest`
    fn clone_repo(
        &self,
        spec: &CloneSpec<'_>,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), CloneFailure>;

    /// Open an existing repository, returning its working tree root
    fn open(&self, dest: &Path) -> Result<PathBuf, String>;

    /// Resolve the commit HEAD points at
    fn resolve_head(&self, root: &Path) -> Result<CommitHash, String>;
}

/// Working tree ready for building
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredSource {
    pub root: PathBuf,
    pub commit: CommitHash,
    /// True if an existing cache entry was reused instead of cloned
    pub reused: bool,
}

/// Clones or reuses working trees in a cache store
#[derive(Clone)]
pub struct SourceAcquirer {
    store: Arc<dyn CacheStore>,
    vcs: Arc<dyn SourceControl>,
}

impl SourceAcquirer {
    pub fn new(store: Arc<dyn CacheStore>, vcs: Arc<dyn SourceControl>) -> Self {
        Self { store, vcs }
    }

    /// Run acquisition on a blocking thread.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires, even if the clone is
    /// stuck in a network call; the blocking thread then winds down on its
    /// own once the transport gives up.
    pub async fn acquire(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> ShipyardResult<AcquiredSource> {
        let this = self.clone();
        let request = request.clone();
        let token = cancel.clone();

        let task = tokio::task::spawn_blocking(move || this.acquire_blocking(&request, &token));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Acquisition cancelled, leaving clone thread to unwind");
                Err(ShipyardError::Cancelled { stage: "clone" })
            }
            joined = task => joined
                .map_err(|e| ShipyardError::Internal(format!("acquisition task failed: {}", e)))?,
        }
    }

    /// Clone-or-open, then resolve HEAD. Strictly sequential, no retries.
    pub fn acquire_blocking(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> ShipyardResult<AcquiredSource> {
        if cancel.is_cancelled() {
            return Err(ShipyardError::Cancelled { stage: "clone" });
        }

        let entry = self.store.ensure(request.push_location())?;
        let url = request.source_location();

        info!("Cloning {} with token credentials", url);
        let spec = CloneSpec {
            url,
            remote_name: request.source_ref(),
            credential: request.credential(),
        };

        let (root, reused) = match self.vcs.clone_repo(&spec, &entry.path, cancel) {
            Ok(()) => (self.open(url, &entry.path)?, false),
            Err(CloneFailure::AlreadyExists) => {
                info!("Repository already cached, opening {}", entry.path.display());
                (self.open(url, &entry.path)?, true)
            }
            Err(CloneFailure::Cancelled) => return Err(ShipyardError::Cancelled { stage: "clone" }),
            Err(CloneFailure::Other(reason)) => return Err(ShipyardError::clone_failed(url, reason)),
        };

        let commit = self
            .vcs
            .resolve_head(&root)
            .map_err(|reason| ShipyardError::ReferenceResolution {
                path: root.clone(),
                reason,
            })?;
        debug!("HEAD of {} is {}", root.display(), commit);

        Ok(AcquiredSource {
            root,
            commit,
            reused,
        })
    }

    fn open(&self, url: &str, dest: &Path) -> ShipyardResult<PathBuf> {
        self.vcs.open(dest).map_err(|reason| {
            ShipyardError::clone_failed(
                url,
                format!("{} does not hold a usable repository: {}", dest.display(), reason),
            )
        })
    }
}
