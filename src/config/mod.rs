//! Configuration management for Shipyard

pub mod schema;

pub use schema::{
    BackendConfig, BuildConfig, CacheConfig, Config, FrontendChoice, GeneralConfig,
    ProgressConfig, ProgressMode, RenderFailurePolicy,
};

use crate::error::{ShipyardError, ShipyardResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shipyard")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> ShipyardResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> ShipyardResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ShipyardError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| ShipyardError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if config.progress.channel_capacity == 0 {
            return Err(ShipyardError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: "progress.channel_capacity must be at least 1".to_string(),
            });
        }

        Ok(config)
    }

    /// Render configuration as TOML
    pub fn render(config: &Config) -> ShipyardResult<String> {
        Ok(toml::to_string_pretty(config)?)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
