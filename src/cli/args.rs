//! CLI argument definitions using clap derive

use crate::config::{FrontendChoice, ProgressMode};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shipyard - one-shot image build driver
///
/// Clones a repository, builds it with BuildKit and pushes the image
/// tagged with the commit it was built from.
#[derive(Parser, Debug)]
#[command(name = "shipyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHIPYARD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone, build and push an image
    Build(BuildArgs),

    /// Inspect the working-tree cache
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Image reference to push; the short commit hash is appended
    pub push_location: String,

    /// Git repository URL or path
    pub source_location: String,

    /// Remote name the repository is cloned under
    pub source_ref: String,

    /// Token for the git remote
    #[arg(env = "SHIPYARD_GIT_TOKEN", hide_env_values = true)]
    pub credential: String,

    /// Dockerfile path relative to the repository root
    #[arg(short, long)]
    pub dockerfile: Option<PathBuf>,

    /// Directory holding cached working trees
    #[arg(long, env = "SHIPYARD_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,

    /// Frontend used to interpret the Dockerfile
    #[arg(long, value_enum)]
    pub frontend: Option<FrontendArg>,

    /// Progress output
    #[arg(long, value_enum)]
    pub progress: Option<ProgressArg>,

    /// buildkitd address (e.g. tcp://buildkitd:1234)
    #[arg(long, env = "BUILDKIT_HOST")]
    pub addr: Option<String>,

    /// Build without pushing the image
    #[arg(long)]
    pub no_push: bool,

    /// Abort the build after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Frontend selection on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FrontendArg {
    /// BuildKit's built-in Dockerfile frontend
    Dockerfile,
    /// docker/dockerfile gateway image
    Gateway,
}

impl From<FrontendArg> for FrontendChoice {
    fn from(arg: FrontendArg) -> Self {
        match arg {
            FrontendArg::Dockerfile => FrontendChoice::Dockerfile,
            FrontendArg::Gateway => FrontendChoice::Gateway,
        }
    }
}

/// Progress selection on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressArg {
    Auto,
    Tty,
    Plain,
    Quiet,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Auto => ProgressMode::Auto,
            ProgressArg::Tty => ProgressMode::Tty,
            ProgressArg::Plain => ProgressMode::Plain,
            ProgressArg::Quiet => ProgressMode::Quiet,
        }
    }
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,

    /// Directory holding cached working trees
    #[arg(long, global = true, env = "SHIPYARD_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached working trees
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the working-tree directory for a push location
    Path {
        /// Image reference the build is pushed under
        push_location: String,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_takes_positional_inputs_in_order() {
        let cli = Cli::try_parse_from([
            "shipyard",
            "build",
            "registry.local/app",
            "https://git.example/app.git",
            "origin",
            "tok",
            "--frontend",
            "dockerfile",
        ])
        .unwrap();

        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.push_location, "registry.local/app");
                assert_eq!(args.source_location, "https://git.example/app.git");
                assert_eq!(args.source_ref, "origin");
                assert_eq!(args.credential, "tok");
                assert!(matches!(args.frontend, Some(FrontendArg::Dockerfile)));
                assert!(!args.no_push);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn cache_path_parses() {
        let cli = Cli::try_parse_from(["shipyard", "cache", "path", "svc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheArgs {
                action: CacheAction::Path { .. },
                ..
            })
        ));
    }
}
