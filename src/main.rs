//! Shipyard - one-shot image build driver
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use shipyard::cli::{Cli, Commands};
use shipyard::config::ConfigManager;
use shipyard::error::ShipyardResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{} {}: {}",
                style("Error:").red().bold(),
                style(e.stage()).bold(),
                e
            );
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ShipyardResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // The log format lives in the config, so loading it logs through a
    // scoped text subscriber
    let config = {
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::fmt()
                .with_env_filter(log_filter(cli.verbose))
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .finish(),
        );
        config_manager.load().await?
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_filter(cli.verbose))
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(cli.verbose))
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
    debug!("Configuration from {}", config_manager.path().display());

    // Dispatch to command
    match cli.command {
        Commands::Build(args) => shipyard::cli::commands::build(args, &config).await,
        Commands::Cache(args) => shipyard::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            shipyard::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("shipyard=warn"),
        1 => EnvFilter::new("shipyard=info"),
        _ => EnvFilter::new("shipyard=debug"),
    }
}
