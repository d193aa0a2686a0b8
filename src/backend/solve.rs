//! Solve configuration handed to a build backend

use crate::config::{BuildConfig, FrontendChoice};
use crate::error::{ShipyardError, ShipyardResult};
use crate::tag::ImageTag;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named resource holding the build context
pub const CONTEXT: &str = "context";
/// Named resource holding the directory of the Dockerfile
pub const DOCKERFILE: &str = "dockerfile";

/// Frontend that interprets the Dockerfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frontend {
    /// BuildKit's built-in Dockerfile frontend
    Dockerfile,
    /// Gateway frontend pulled from an image, e.g. `docker/dockerfile`
    Gateway { source: String },
}

impl Frontend {
    /// Frontend identifier understood by BuildKit
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dockerfile => "dockerfile.v0",
            Self::Gateway { .. } => "gateway.v0",
        }
    }
}

/// An image export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    /// Image name the result is stored under
    pub target: String,
    /// Push to the registry named by `target`
    pub push: bool,
    /// Additional exporter attributes
    pub attrs: BTreeMap<String, String>,
}

impl ExportEntry {
    /// Exporter attributes including `name` and `push`
    pub fn exporter_attrs(&self) -> BTreeMap<String, String> {
        let mut attrs = self.attrs.clone();
        attrs.insert("name".to_string(), self.target.clone());
        attrs.insert("push".to_string(), self.push.to_string());
        attrs
    }
}

/// Everything a backend needs to run one solve; read-only once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveConfiguration {
    pub exports: Vec<ExportEntry>,
    pub named_resources: BTreeMap<String, PathBuf>,
    pub frontend: Frontend,
    pub frontend_attrs: BTreeMap<String, String>,
}

/// Frontend and export choices shared by every build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Dockerfile path relative to the working tree root
    pub dockerfile: PathBuf,
    pub frontend: Frontend,
    pub frontend_attrs: BTreeMap<String, String>,
    pub export_attrs: BTreeMap<String, String>,
    pub push: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self::from(&BuildConfig::default())
    }
}

impl From<&BuildConfig> for BuildSettings {
    fn from(config: &BuildConfig) -> Self {
        let frontend = match config.frontend {
            FrontendChoice::Dockerfile => Frontend::Dockerfile,
            FrontendChoice::Gateway => Frontend::Gateway {
                source: config.gateway_source.clone(),
            },
        };
        Self {
            dockerfile: config.dockerfile.clone(),
            frontend,
            frontend_attrs: config.frontend_attrs.clone(),
            export_attrs: config.export_attrs.clone(),
            push: config.push,
        }
    }
}

impl SolveConfiguration {
    /// Build the configuration for `root` exported as `tag`.
    ///
    /// `dockerfile` is resolved against `root` unless absolute.
    pub fn new(
        settings: &BuildSettings,
        root: &Path,
        tag: &ImageTag,
        dockerfile: &Path,
    ) -> ShipyardResult<Self> {
        let file = if dockerfile.is_absolute() {
            dockerfile.to_path_buf()
        } else {
            root.join(dockerfile)
        };
        if !file.is_file() {
            return Err(ShipyardError::DockerfileNotFound(file));
        }

        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ShipyardError::DockerfileNotFound(file.clone()))?
            .to_string();
        let dockerfile_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());

        let mut named_resources = BTreeMap::new();
        named_resources.insert(CONTEXT.to_string(), root.to_path_buf());
        named_resources.insert(DOCKERFILE.to_string(), dockerfile_dir);

        let mut frontend_attrs = settings.frontend_attrs.clone();
        frontend_attrs.insert("filename".to_string(), filename);
        if let Frontend::Gateway { ref source } = settings.frontend {
            frontend_attrs.insert("source".to_string(), source.clone());
        }

        Ok(Self {
            exports: vec![ExportEntry {
                target: tag.to_string(),
                push: settings.push,
                attrs: settings.export_attrs.clone(),
            }],
            named_resources,
            frontend: settings.frontend.clone(),
            frontend_attrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::resolve_tag;
    use tempfile::TempDir;

    fn tag() -> ImageTag {
        resolve_tag("registry.local/app", "abc1234def0123456789").unwrap()
    }

    #[test]
    fn default_settings_use_gateway_frontend() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Dockerfile"), "FROM scratch\n").unwrap();

        let config =
            SolveConfiguration::new(&BuildSettings::default(), temp.path(), &tag(), Path::new("Dockerfile"))
                .unwrap();

        assert_eq!(config.frontend.name(), "gateway.v0");
        assert_eq!(config.frontend_attrs["filename"], "Dockerfile");
        assert_eq!(config.frontend_attrs["source"], "docker/dockerfile");
        assert_eq!(config.named_resources[CONTEXT], temp.path());
        assert_eq!(config.named_resources[DOCKERFILE], temp.path());

        assert_eq!(config.exports.len(), 1);
        let export = &config.exports[0];
        assert_eq!(export.target, "registry.local/app-abc1234");
        assert!(export.push);
        assert_eq!(export.exporter_attrs()["push"], "true");
        assert_eq!(export.exporter_attrs()["name"], "registry.local/app-abc1234");
    }

    #[test]
    fn nested_dockerfile_binds_its_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("deploy")).unwrap();
        std::fs::write(temp.path().join("deploy/app.Dockerfile"), "FROM scratch\n").unwrap();

        let settings = BuildSettings {
            frontend: Frontend::Dockerfile,
            push: false,
            ..BuildSettings::default()
        };
        let config = SolveConfiguration::new(
            &settings,
            temp.path(),
            &tag(),
            Path::new("deploy/app.Dockerfile"),
        )
        .unwrap();

        assert_eq!(config.frontend.name(), "dockerfile.v0");
        assert!(!config.frontend_attrs.contains_key("source"));
        assert_eq!(config.frontend_attrs["filename"], "app.Dockerfile");
        assert_eq!(config.named_resources[DOCKERFILE], temp.path().join("deploy"));
        assert!(!config.exports[0].push);
    }

    #[test]
    fn missing_dockerfile_is_reported() {
        let temp = TempDir::new().unwrap();
        let err = SolveConfiguration::new(
            &BuildSettings::default(),
            temp.path(),
            &tag(),
            Path::new("Dockerfile"),
        )
        .unwrap_err();
        assert!(matches!(err, ShipyardError::DockerfileNotFound(_)));
        assert_eq!(err.stage(), "build");
    }

    #[test]
    fn configured_attrs_are_carried() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Dockerfile"), "FROM scratch\n").unwrap();

        let mut settings = BuildSettings::default();
        settings
            .frontend_attrs
            .insert("build-arg:VERSION".to_string(), "1.0".to_string());
        settings
            .export_attrs
            .insert("compression".to_string(), "zstd".to_string());

        let config =
            SolveConfiguration::new(&settings, temp.path(), &tag(), Path::new("Dockerfile")).unwrap();
        assert_eq!(config.frontend_attrs["build-arg:VERSION"], "1.0");
        assert_eq!(config.exports[0].exporter_attrs()["compression"], "zstd");
    }
}
