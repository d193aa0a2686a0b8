//! Build backend abstraction
//!
//! The backend executes a [`SolveConfiguration`] and streams status events
//! while it works. Registry credentials and push mechanics belong to the
//! backend.

mod buildctl;
pub mod solve;

pub use buildctl::BuildctlBackend;
pub use solve::{BuildSettings, ExportEntry, Frontend, SolveConfiguration};

use crate::error::ShipyardResult;
use crate::progress::StatusEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Abstract build backend interface
#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Verify the backend can accept work; failures are `BackendInit`
    async fn ensure_ready(&self) -> ShipyardResult<()>;

    /// Run one solve, sending status events on `status` as they arrive.
    ///
    /// Returns `Cancelled` promptly once `cancel` fires.
    async fn solve(
        &self,
        config: &SolveConfiguration,
        status: mpsc::Sender<StatusEvent>,
        cancel: CancellationToken,
    ) -> ShipyardResult<()>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}
