//! Build progress reporting
//!
//! A [`ProgressReporter`] consumes the status stream of exactly one solve.
//! It ends when the stream closes (build complete) or the build scope is
//! cancelled, whichever it observes first; cancellation wins ties.

mod event;
mod render;

pub use event::{StatusEvent, VertexUpdate};
pub use render::{PlainRenderer, QuietRenderer, Renderer, TtyRenderer};

use crate::config::{ProgressMode, RenderFailurePolicy};
use crate::error::{ShipyardError, ShipyardResult};
use crate::ui::UiContext;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Counters collected while streaming
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub events: usize,
    pub vertices: usize,
    pub completed: usize,
    pub cached: usize,
    /// Rendering broke and the rest of the stream was drained silently
    pub degraded: bool,
}

#[derive(Default)]
struct Tally {
    summary: ProgressSummary,
    vertices: HashSet<String>,
    completed: HashSet<String>,
    cached: HashSet<String>,
}

impl Tally {
    fn observe(&mut self, event: &StatusEvent) {
        self.summary.events += 1;
        if let StatusEvent::Vertex(v) = event {
            self.vertices.insert(v.digest.clone());
            if v.cached {
                self.cached.insert(v.digest.clone());
            }
            if v.is_completed() || v.cached {
                self.completed.insert(v.digest.clone());
            }
        }
    }

    fn snapshot(&self) -> ProgressSummary {
        ProgressSummary {
            vertices: self.vertices.len(),
            completed: self.completed.len(),
            cached: self.cached.len(),
            ..self.summary.clone()
        }
    }
}

/// Single-use consumer of a solve's status stream
pub struct ProgressReporter {
    renderer: Box<dyn Renderer>,
    policy: RenderFailurePolicy,
}

impl ProgressReporter {
    pub fn new(renderer: Box<dyn Renderer>, policy: RenderFailurePolicy) -> Self {
        Self { renderer, policy }
    }

    /// Pick a renderer for `mode`, drawing on stderr
    pub fn for_mode(
        mode: ProgressMode,
        ctx: &UiContext,
        label: &str,
        policy: RenderFailurePolicy,
    ) -> Self {
        let renderer: Box<dyn Renderer> = match mode {
            ProgressMode::Auto if ctx.use_fancy_output() => Box::new(TtyRenderer::new(label)),
            ProgressMode::Auto | ProgressMode::Plain => {
                Box::new(PlainRenderer::new(std::io::stderr()))
            }
            ProgressMode::Tty => Box::new(TtyRenderer::new(label)),
            ProgressMode::Quiet => Box::new(QuietRenderer),
        };
        Self::new(renderer, policy)
    }

    /// Consume `events` until the stream closes or `cancel` fires
    pub async fn stream(
        mut self,
        mut events: mpsc::Receiver<StatusEvent>,
        cancel: CancellationToken,
    ) -> ShipyardResult<ProgressSummary> {
        let mut tally = Tally::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.renderer.abort();
                    return Err(ShipyardError::Cancelled { stage: "progress" });
                }
                next = events.recv() => next,
            };
            let Some(event) = next else { break };

            tally.observe(&event);
            if tally.summary.degraded {
                continue;
            }
            if let Err(e) = self.renderer.render(&event) {
                self.render_failed(e, &mut tally)?;
            }
        }

        let summary = tally.snapshot();
        if !summary.degraded {
            if let Err(e) = self.renderer.finish(&summary) {
                self.render_failed(e, &mut tally)?;
                return Ok(tally.snapshot());
            }
        }
        Ok(summary)
    }

    fn render_failed(&mut self, error: std::io::Error, tally: &mut Tally) -> ShipyardResult<()> {
        match self.policy {
            RenderFailurePolicy::Fail => Err(ShipyardError::Render(error.to_string())),
            RenderFailurePolicy::Degrade => {
                warn!("Progress output failed, continuing build without it: {}", error);
                tally.summary.degraded = true;
                Ok(())
            }
        }
    }
}
