//! Build command - clone, build and push one image

use crate::backend::{BuildBackend, BuildSettings, BuildctlBackend};
use crate::cache::FsCacheStore;
use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::driver::BuildDriver;
use crate::error::ShipyardResult;
use crate::orchestrator::BuildOrchestrator;
use crate::progress::ProgressReporter;
use crate::request::{BuildRequest, Credential};
use crate::source::{Git2Source, SourceAcquirer};
use crate::ui::{self, UiContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> ShipyardResult<()> {
    let config = apply_overrides(&args, config);
    let request = BuildRequest::new(
        args.push_location,
        args.source_location,
        args.source_ref,
        Credential::new(args.credential),
    )?;
    debug!("Cache root: {}", config.cache.root.display());

    let ctx = UiContext::detect();
    let cancel = CancellationToken::new();
    let watchers = spawn_cancel_watchers(&cancel, args.timeout);

    let backend: Arc<dyn BuildBackend> = Arc::new(BuildctlBackend::from_config(&config.backend));
    let acquirer = SourceAcquirer::new(
        Arc::new(FsCacheStore::new(&config.cache.root)),
        Arc::new(Git2Source::new()),
    );
    let orchestrator = BuildOrchestrator::new(backend.clone(), BuildSettings::from(&config.build))
        .with_channel_capacity(config.progress.channel_capacity);
    let driver = BuildDriver::new(acquirer, backend, orchestrator);

    let reporter = ProgressReporter::for_mode(
        config.progress.mode,
        &ctx,
        request.push_location(),
        config.progress.on_render_error,
    );

    let result = driver.run(&request, reporter, &cancel).await;
    for watcher in watchers {
        watcher.abort();
    }
    let report = result?;

    if report.outcome.progress.degraded {
        ui::step_warn(&ctx, "Progress output was interrupted during the build");
    }
    let verb = if config.build.push { "Pushed" } else { "Built" };
    ui::step_ok(&ctx, &format!("{} {}", verb, report.tag));
    ui::key_value(&ctx, "commit", report.source.commit.as_str());
    ui::key_value(&ctx, "source", &report.source.root.display().to_string());
    ui::key_value(
        &ctx,
        "steps",
        &format!(
            "{} ({} cached)",
            report.outcome.progress.vertices, report.outcome.progress.cached
        ),
    );
    // Machine-readable result on stdout
    println!("{}", report.tag);

    Ok(())
}

/// Command-line flags take precedence over the config file
fn apply_overrides(args: &BuildArgs, config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(ref dockerfile) = args.dockerfile {
        config.build.dockerfile = dockerfile.clone();
    }
    if let Some(ref root) = args.cache_root {
        config.cache.root = root.clone();
    }
    if let Some(frontend) = args.frontend {
        config.build.frontend = frontend.into();
    }
    if let Some(progress) = args.progress {
        config.progress.mode = progress.into();
    }
    if let Some(ref addr) = args.addr {
        config.backend.addr = Some(addr.clone());
    }
    if args.no_push {
        config.build.push = false;
    }
    config
}

/// Cancel the build on Ctrl-C or when the optional timeout elapses
fn spawn_cancel_watchers(cancel: &CancellationToken, timeout: Option<u64>) -> Vec<JoinHandle<()>> {
    let mut watchers = Vec::new();

    let token = cancel.clone();
    watchers.push(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling build");
            token.cancel();
        }
    }));

    if let Some(secs) = timeout {
        let token = cancel.clone();
        watchers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!("Build timed out after {}s, cancelling", secs);
            token.cancel();
        }));
    }

    watchers
}
