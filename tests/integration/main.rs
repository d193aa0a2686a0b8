//! Integration tests for Shipyard

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Command with an isolated, nonexistent config file
    fn shipyard(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("shipyard");
        cmd.env("SHIPYARD_CONFIG", temp.path().join("config.toml"))
            .env("SHIPYARD_CACHE_ROOT", temp.path().join("cache"))
            .env_remove("SHIPYARD_GIT_TOKEN");
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("One-shot image build driver"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shipyard"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("[progress]"));
    }

    #[test]
    fn config_loading_is_logged() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["-vv", "config", "path"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Config file not found, using defaults"));
    }

    #[test]
    fn invalid_config_file_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[build\n").unwrap();
        shipyard(&temp)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("config"));
    }

    #[test]
    fn cache_path_is_encoded() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["cache", "path", "registry.local/app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("registry_2elocal_2fapp"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached working trees"));
    }

    #[test]
    fn build_requires_credential() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["build", "registry.local/app", "https://git.example/app.git", "origin"])
            .assert()
            .failure();
    }

    #[test]
    fn build_rejects_empty_push_location() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["build", "", "https://git.example/app.git", "origin", "token"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("request"));
    }

    #[test]
    fn build_rejects_whitespace_push_location() {
        let temp = TempDir::new().unwrap();
        shipyard(&temp)
            .args(["build", "registry.local/my app", "https://git.example/app.git", "origin", "token"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("request"));
        assert!(!temp.path().join("cache").exists());
    }
}

mod acquisition_tests {
    use git2::{Repository, Signature};
    use shipyard::cache::FsCacheStore;
    use shipyard::error::ShipyardError;
    use shipyard::request::{BuildRequest, Credential};
    use shipyard::source::{Git2Source, SourceAcquirer};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    /// Create a repository at `dir` with one commit holding a Dockerfile
    pub fn seed_repo(dir: &Path) -> String {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("Dockerfile"), "FROM scratch\nCOPY . /\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("Dockerfile")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Shipyard Test", "test@example.com").unwrap();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
        oid.to_string()
    }

    pub fn acquirer(cache: &Path) -> SourceAcquirer {
        SourceAcquirer::new(
            Arc::new(FsCacheStore::new(cache)),
            Arc::new(Git2Source::new()),
        )
    }

    pub fn request(push: &str, origin: &Path) -> BuildRequest {
        BuildRequest::new(
            push,
            origin.to_string_lossy(),
            "origin",
            Credential::new("unused-token"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fresh_clone_resolves_head() {
        let origin = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let head = seed_repo(origin.path());

        let source = acquirer(cache.path())
            .acquire(&request("registry.local/app", origin.path()), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!source.reused);
        assert_eq!(source.commit.as_str(), head);
        assert_eq!(source.commit.as_str().len(), 40);
        assert!(source.root.join("Dockerfile").is_file());
        assert!(source.root.starts_with(cache.path()));
    }

    #[tokio::test]
    async fn second_acquire_reuses_cache() {
        let origin = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let head = seed_repo(origin.path());
        let acquirer = acquirer(cache.path());
        let req = request("registry.local/app", origin.path());

        let first = acquirer.acquire(&req, &CancellationToken::new()).await.unwrap();
        let second = acquirer.acquire(&req, &CancellationToken::new()).await.unwrap();

        assert!(!first.reused);
        assert!(second.reused);
        assert_eq!(first.root, second.root);
        assert_eq!(second.commit.as_str(), head);
    }

    #[tokio::test]
    async fn empty_repository_fails_head_resolution() {
        let origin = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        Repository::init(origin.path()).unwrap();

        let err = acquirer(cache.path())
            .acquire(&request("registry.local/empty", origin.path()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ShipyardError::ReferenceResolution { .. }));
        assert_eq!(err.stage(), "resolve-head");
    }

    #[tokio::test]
    async fn missing_origin_is_a_clone_error() {
        let cache = TempDir::new().unwrap();
        let missing = cache.path().join("no-such-repo");

        let err = acquirer(cache.path())
            .acquire(&request("registry.local/app", &missing), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ShipyardError::Clone { .. }));
    }

    #[tokio::test]
    async fn cancelled_before_start_skips_clone() {
        let origin = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        seed_repo(origin.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = acquirer(cache.path())
            .acquire(&request("registry.local/app", origin.path()), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
    }
}

mod driver_tests {
    use super::acquisition_tests::{acquirer, request, seed_repo};
    use async_trait::async_trait;
    use shipyard::backend::{BuildBackend, BuildSettings, SolveConfiguration};
    use shipyard::config::RenderFailurePolicy;
    use shipyard::driver::BuildDriver;
    use shipyard::error::{ShipyardError, ShipyardResult};
    use shipyard::orchestrator::BuildOrchestrator;
    use shipyard::progress::{ProgressReporter, QuietRenderer, StatusEvent, VertexUpdate};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct RecordingBackend {
        ready: bool,
        solved: Mutex<Vec<SolveConfiguration>>,
    }

    #[async_trait]
    impl BuildBackend for RecordingBackend {
        async fn ensure_ready(&self) -> ShipyardResult<()> {
            if self.ready {
                Ok(())
            } else {
                Err(ShipyardError::BackendInit("no daemon".to_string()))
            }
        }

        async fn solve(
            &self,
            config: &SolveConfiguration,
            status: mpsc::Sender<StatusEvent>,
            _cancel: CancellationToken,
        ) -> ShipyardResult<()> {
            self.solved.lock().unwrap().push(config.clone());
            let _ = status
                .send(StatusEvent::Vertex(VertexUpdate {
                    digest: "sha256:1".to_string(),
                    name: "[1/1] COPY . /".to_string(),
                    started: None,
                    completed: None,
                    cached: true,
                    error: None,
                }))
                .await;
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "recording"
        }
    }

    fn reporter() -> ProgressReporter {
        ProgressReporter::new(Box::new(QuietRenderer), RenderFailurePolicy::Degrade)
    }

    fn driver(cache: &std::path::Path, backend: Arc<RecordingBackend>) -> BuildDriver {
        let orchestrator = BuildOrchestrator::new(backend.clone(), BuildSettings::default());
        BuildDriver::new(acquirer(cache), backend, orchestrator)
    }

    #[tokio::test]
    async fn build_pushes_commit_tagged_image() {
        let origin = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let head = seed_repo(origin.path());
        let backend = Arc::new(RecordingBackend {
            ready: true,
            ..Default::default()
        });

        let report = driver(cache.path(), backend.clone())
            .run(
                &request("registry.local/app", origin.path()),
                reporter(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let expected = format!("registry.local/app-{}", &head[..7]);
        assert_eq!(report.tag.as_str(), expected);
        assert_eq!(report.outcome.progress.events, 1);

        let solved = backend.solved.lock().unwrap();
        assert_eq!(solved.len(), 1);
        assert_eq!(solved[0].exports.len(), 1);
        assert_eq!(solved[0].exports[0].target, expected);
        assert!(solved[0].exports[0].push);
        assert_eq!(solved[0].named_resources["context"], report.source.root);
    }

    #[tokio::test]
    async fn unavailable_backend_stops_before_solve() {
        let origin = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        seed_repo(origin.path());
        let backend = Arc::new(RecordingBackend::default());

        let err = driver(cache.path(), backend.clone())
            .run(
                &request("registry.local/app", origin.path()),
                reporter(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "backend");
        assert!(backend.solved.lock().unwrap().is_empty());
    }
}
