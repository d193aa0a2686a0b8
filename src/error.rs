//! Error types for Shipyard
//!
//! All modules use `ShipyardResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Shipyard operations
pub type ShipyardResult<T> = Result<T, ShipyardError>;

/// All errors that can occur while driving a build
#[derive(Error, Debug)]
pub enum ShipyardError {
    // Request and configuration errors
    #[error("Invalid {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Source acquisition errors
    #[error("Failed to create cache directory {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to clone {url}: {reason}")]
    Clone { url: String, reason: String },

    #[error("Failed to resolve HEAD in {path}: {reason}")]
    ReferenceResolution { path: PathBuf, reason: String },

    // Build errors
    #[error("Build backend unavailable: {0}")]
    BackendInit(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Progress rendering failed: {0}")]
    Render(String),

    #[error("Cancelled during {stage}")]
    Cancelled { stage: &'static str },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShipyardError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a request validation error
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    /// Create a clone error tagged with its cause
    pub fn clone_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Clone {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Pipeline stage the error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "request",
            Self::ConfigInvalid { .. } | Self::TomlParse(_) | Self::TomlSerialize(_) => "config",
            Self::InvalidArgument(_) => "tag",
            Self::Filesystem { .. } => "cache",
            Self::Clone { .. } => "clone",
            Self::ReferenceResolution { .. } => "resolve-head",
            Self::BackendInit(_) => "backend",
            Self::Build(_) | Self::DockerfileNotFound(_) => "build",
            Self::Render(_) => "progress",
            Self::Cancelled { stage } => *stage,
            Self::Io { .. } | Self::Internal(_) => "internal",
        }
    }

    /// Whether the error only reports that the build scope was cancelled
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BackendInit(_) => {
                Some("Check that buildkitd is running and BUILDKIT_HOST or backend.addr points at it")
            }
            Self::Clone { .. } => Some("Check the repository URL and that the token can read it"),
            Self::ReferenceResolution { .. } => Some("The repository must have at least one commit"),
            Self::DockerfileNotFound(_) => Some("Pass --dockerfile with a path relative to the repository root"),
            _ => None,
        }
    }
}
