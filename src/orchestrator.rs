//! Build orchestration
//!
//! Runs the solve and the progress reporter concurrently under one child
//! cancellation scope. The first task to fail cancels the scope; both
//! tasks are always awaited before an outcome is returned, and the first
//! recorded error wins.

use crate::backend::{BuildBackend, BuildSettings, SolveConfiguration};
use crate::error::{ShipyardError, ShipyardResult};
use crate::progress::{ProgressReporter, ProgressSummary, StatusEvent};
use crate::tag::ImageTag;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub tag: ImageTag,
    /// Configuration the backend solved
    pub solve: SolveConfiguration,
    pub progress: ProgressSummary,
}

/// Coordinates one solve and its progress stream
pub struct BuildOrchestrator {
    backend: Arc<dyn BuildBackend>,
    settings: BuildSettings,
    channel_capacity: usize,
}

impl BuildOrchestrator {
    pub fn new(backend: Arc<dyn BuildBackend>, settings: BuildSettings) -> Self {
        Self {
            backend,
            settings,
            channel_capacity: 64,
        }
    }

    /// Bound on buffered status events between solve and progress
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Solve configuration for `root` exported as `tag`
    pub fn solve_configuration(
        &self,
        root: &Path,
        tag: &ImageTag,
        dockerfile: &Path,
    ) -> ShipyardResult<SolveConfiguration> {
        SolveConfiguration::new(&self.settings, root, tag, dockerfile)
    }

    /// Build `root` and push it as `tag`.
    ///
    /// `scope` is the caller's cancellation scope; cancelling it aborts
    /// both tasks. No retries.
    pub async fn run_build(
        &self,
        root: &Path,
        tag: &ImageTag,
        dockerfile: &Path,
        reporter: ProgressReporter,
        scope: &CancellationToken,
    ) -> ShipyardResult<BuildOutcome> {
        let solve = self.solve_configuration(root, tag, dockerfile)?;
        debug!("Solve configuration: {:?}", solve);

        let token = scope.child_token();
        let first_error: OnceLock<ShipyardError> = OnceLock::new();
        let (tx, rx) = mpsc::channel::<StatusEvent>(self.channel_capacity);

        let solve_task = async {
            let result = self
                .backend
                .solve(&solve, tx.clone(), token.clone())
                .await;
            if let Err(e) = result {
                record(&first_error, &token, e);
            }
            // The stream only closes after a failure has cancelled the scope
            drop(tx);
        };

        let progress_task = async {
            match reporter.stream(rx, token.clone()).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    record(&first_error, &token, e);
                    None
                }
            }
        };

        info!("Building {} with {}", tag, self.backend.backend_name());
        let ((), summary) = tokio::join!(solve_task, progress_task);

        if let Some(error) = first_error.into_inner() {
            return Err(error);
        }
        let progress = summary.ok_or_else(|| {
            ShipyardError::Internal("progress ended without a result".to_string())
        })?;
        if progress.degraded {
            warn!("Build of {} finished without complete progress output", tag);
        }

        info!("Built and exported {}", tag);
        Ok(BuildOutcome {
            tag: tag.clone(),
            solve,
            progress,
        })
    }
}

/// Keep the first error and cancel the shared scope
fn record(slot: &OnceLock<ShipyardError>, token: &CancellationToken, error: ShipyardError) {
    debug!("Build task failed: {}", error);
    let _ = slot.set(error);
    token.cancel();
}
