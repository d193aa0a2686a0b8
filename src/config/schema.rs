//! Configuration schema for Shipyard
//!
//! Configuration is stored at `~/.config/shipyard/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Working-tree cache settings
    pub cache: CacheConfig,

    /// Build frontend and export settings
    pub build: BuildConfig,

    /// Build backend connection
    pub backend: BackendConfig,

    /// Progress output
    pub progress: ProgressConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Working-tree cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one working tree per push location
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shipyard")
                .join("buildcache"),
        }
    }
}

/// Frontend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendChoice {
    /// Built-in Dockerfile frontend
    Dockerfile,
    /// Gateway frontend loaded from an image
    Gateway,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Dockerfile path relative to the repository root
    pub dockerfile: PathBuf,

    /// Frontend used to interpret the Dockerfile
    pub frontend: FrontendChoice,

    /// Frontend image when `frontend = "gateway"`
    pub gateway_source: String,

    /// Extra frontend attributes (build-arg:FOO, target, ...)
    pub frontend_attrs: BTreeMap<String, String>,

    /// Extra image exporter attributes
    pub export_attrs: BTreeMap<String, String>,

    /// Push the exported image to its registry
    pub push: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dockerfile: PathBuf::from("Dockerfile"),
            frontend: FrontendChoice::Gateway,
            gateway_source: "docker/dockerfile".to_string(),
            frontend_attrs: BTreeMap::new(),
            export_attrs: BTreeMap::new(),
            push: true,
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// buildctl executable
    pub buildctl: String,

    /// buildkitd address; falls back to BUILDKIT_HOST / buildctl's default
    pub addr: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            buildctl: "buildctl".to_string(),
            addr: None,
        }
    }
}

/// Progress output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Progress bar on a terminal, plain lines otherwise
    Auto,
    Tty,
    Plain,
    Quiet,
}

/// What to do when the progress display breaks mid-build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFailurePolicy {
    /// Log a warning and keep building
    Degrade,
    /// Abort the build
    Fail,
}

/// Progress configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub mode: ProgressMode,

    pub on_render_error: RenderFailurePolicy,

    /// Capacity of the status event channel between solve and progress
    pub channel_capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mode: ProgressMode::Auto,
            on_render_error: RenderFailurePolicy::Degrade,
            channel_capacity: 64,
        }
    }
}
