//! End-to-end build pipeline
//!
//! acquire source -> resolve tag -> check backend -> build and push.
//! Every stage returns its error to the caller; nothing here exits the
//! process.

use crate::backend::BuildBackend;
use crate::error::{ShipyardError, ShipyardResult};
use crate::orchestrator::{BuildOrchestrator, BuildOutcome};
use crate::progress::ProgressReporter;
use crate::request::BuildRequest;
use crate::source::{AcquiredSource, SourceAcquirer};
use crate::tag::{resolve_tag, ImageTag};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything known about a finished build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub source: AcquiredSource,
    pub tag: ImageTag,
    pub outcome: BuildOutcome,
}

/// Runs one build request through every stage
pub struct BuildDriver {
    acquirer: SourceAcquirer,
    backend: Arc<dyn BuildBackend>,
    orchestrator: BuildOrchestrator,
}

impl BuildDriver {
    pub fn new(
        acquirer: SourceAcquirer,
        backend: Arc<dyn BuildBackend>,
        orchestrator: BuildOrchestrator,
    ) -> Self {
        Self {
            acquirer,
            backend,
            orchestrator,
        }
    }

    pub async fn run(
        &self,
        request: &BuildRequest,
        reporter: ProgressReporter,
        cancel: &CancellationToken,
    ) -> ShipyardResult<BuildReport> {
        info!("Starting image build of {}", request.push_location());

        let source = self.acquirer.acquire(request, cancel).await?;
        info!(
            "Source at {} ({}, commit {})",
            source.root.display(),
            if source.reused { "cached" } else { "cloned" },
            source.commit
        );

        let tag = resolve_tag(request.push_location(), source.commit.as_str())?;

        if cancel.is_cancelled() {
            return Err(ShipyardError::Cancelled { stage: "backend" });
        }
        self.backend.ensure_ready().await?;

        let dockerfile = self.orchestrator.settings().dockerfile.clone();
        let outcome = self
            .orchestrator
            .run_build(&source.root, &tag, &dockerfile, reporter, cancel)
            .await?;

        Ok(BuildReport {
            source,
            tag,
            outcome,
        })
    }
}
