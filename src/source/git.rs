//! `git2`-backed source control

use crate::request::Credential;
use crate::source::{CloneFailure, CloneSpec, SourceControl};
use crate::tag::CommitHash;
use git2::build::RepoBuilder;
use git2::{Cred, ErrorCode, FetchOptions, RemoteCallbacks, Repository};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Time allowed to establish a connection to the remote
const CONNECT_TIMEOUT_MS: i32 = 30_000;
/// Time a connected remote may stay silent before the transfer fails
const SERVER_TIMEOUT_MS: i32 = 120_000;

/// Source control through libgit2
#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Source;

impl Git2Source {
    pub fn new() -> Self {
        Self
    }
}

impl SourceControl for Git2Source {
    fn clone_repo(
        &self,
        spec: &CloneSpec<'_>,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), CloneFailure> {
        // libgit2 refuses non-empty destinations; report that before any network traffic
        if !dir_is_empty(dest) {
            return Err(CloneFailure::AlreadyExists);
        }
        configure_transport_timeouts();

        let mut callbacks = RemoteCallbacks::new();
        let token = spec.credential.clone();
        let mut offered = false;
        callbacks.credentials(move |_url, _username, _allowed| {
            // libgit2 keeps asking after a rejection; one attempt only
            if offered {
                return Err(git2::Error::from_str("authentication rejected"));
            }
            offered = true;
            Cred::userpass_plaintext(Credential::USERNAME, token.expose())
        });
        callbacks.transfer_progress(|stats| {
            if stats.received_objects() == stats.total_objects() && stats.total_objects() > 0 {
                debug!("Received {} objects", stats.total_objects());
            }
            // Returning false aborts the transfer
            !cancel.is_cancelled()
        });

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);

        let remote_name = spec.remote_name.to_string();
        let mut builder = RepoBuilder::new();
        builder
            .fetch_options(fetch)
            .remote_create(move |repo, _name, url| repo.remote(&remote_name, url));

        debug!("Cloning {} into {}", spec.url, dest.display());
        match builder.clone(spec.url, dest) {
            Ok(_) => Ok(()),
            Err(_) if cancel.is_cancelled() => Err(CloneFailure::Cancelled),
            Err(e) if e.code() == ErrorCode::Exists => Err(CloneFailure::AlreadyExists),
            Err(e) => Err(CloneFailure::Other(e.message().to_string())),
        }
    }

    fn open(&self, dest: &Path) -> Result<PathBuf, String> {
        let repo = Repository::open(dest).map_err(|e| e.message().to_string())?;
        repo.workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| format!("{} is a bare repository", dest.display()))
    }

    fn resolve_head(&self, root: &Path) -> Result<CommitHash, String> {
        let repo = Repository::open(root).map_err(|e| e.message().to_string())?;
        let head = repo.head().map_err(|e| match e.code() {
            ErrorCode::UnbornBranch => "repository has no commits".to_string(),
            _ => e.message().to_string(),
        })?;
        let commit = head.peel_to_commit().map_err(|e| e.message().to_string())?;
        Ok(commit.id().into())
    }
}

/// Bound libgit2's network waits so an abandoned clone thread terminates.
/// Cancellation is only observed while objects are transferring.
fn configure_transport_timeouts() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // SAFETY: process-wide libgit2 options, set once before the first clone
        let connect = unsafe { git2::opts::set_server_connect_timeout_in_milliseconds(CONNECT_TIMEOUT_MS) };
        let server = unsafe { git2::opts::set_server_timeout_in_milliseconds(SERVER_TIMEOUT_MS) };
        if let Err(e) = connect.and(server) {
            warn!("Could not set git transport timeouts: {}", e.message());
        }
    });
}

fn dir_is_empty(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
