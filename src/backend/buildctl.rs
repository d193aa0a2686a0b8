//! BuildKit backend driven through `buildctl`
//!
//! Runs `buildctl build --progress rawjson` and turns each JSON status line
//! on stderr into [`StatusEvent`]s.

use crate::backend::{BuildBackend, SolveConfiguration};
use crate::config::BackendConfig;
use crate::error::{ShipyardError, ShipyardResult};
use crate::progress::{StatusEvent, VertexUpdate};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Max number of diagnostic lines kept for error reporting
const DIAGNOSTIC_TAIL_LINES: usize = 50;

/// BuildKit via the `buildctl` client
#[derive(Debug, Clone)]
pub struct BuildctlBackend {
    program: String,
    addr: Option<String>,
}

impl BuildctlBackend {
    pub fn new(program: impl Into<String>, addr: Option<String>) -> Self {
        Self {
            program: program.into(),
            addr,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.buildctl.clone(), config.addr.clone())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(ref addr) = self.addr {
            cmd.args(["--addr", addr]);
        }
        cmd
    }
}

#[async_trait]
impl BuildBackend for BuildctlBackend {
    async fn ensure_ready(&self) -> ShipyardResult<()> {
        debug!("Probing buildkitd through {} debug workers", self.program);

        let output = self
            .command()
            .args(["debug", "workers"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ShipyardError::BackendInit(format!("cannot run {}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ShipyardError::BackendInit(summarize(
                &stderr.lines().map(str::to_string).collect::<Vec<_>>(),
                output.status.code(),
            )))
        }
    }

    async fn solve(
        &self,
        config: &SolveConfiguration,
        status: mpsc::Sender<StatusEvent>,
        cancel: CancellationToken,
    ) -> ShipyardResult<()> {
        let args = build_args(config);
        debug!("Running: {} {:?}", self.program, args);

        let mut child = self
            .command()
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShipyardError::Build(format!("cannot run {}: {}", self.program, e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShipyardError::Internal("buildctl stderr not captured".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();
        let mut diagnostics: Vec<String> = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                line = lines.next_line() => Some(line),
            };
            let Some(line) = next else {
                return Err(abort(&mut child).await);
            };
            let Some(line) = line.map_err(|e| ShipyardError::io("reading buildctl output", e))? else {
                break;
            };

            let Some(events) = parse_status_line(&line) else {
                if !line.trim().is_empty() {
                    push_diagnostic(&mut diagnostics, line);
                }
                continue;
            };

            for event in events {
                if let StatusEvent::Vertex(VertexUpdate {
                    ref name,
                    error: Some(ref error),
                    ..
                }) = event
                {
                    push_diagnostic(&mut diagnostics, format!("{}: {}", name, error));
                }

                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    sent = status.send(event) => Some(sent),
                };
                match sent {
                    None => return Err(abort(&mut child).await),
                    Some(Err(_)) => trace!("Progress receiver closed, dropping status event"),
                    Some(Ok(())) => {}
                }
            }
        }

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            exit = child.wait() => Some(exit),
        };
        let Some(exit) = waited else {
            return Err(abort(&mut child).await);
        };
        let exit = exit.map_err(|e| ShipyardError::io("waiting for buildctl", e))?;

        if exit.success() {
            info!("Solve completed");
            Ok(())
        } else {
            debug!("buildctl diagnostics:\n{}", diagnostics.join("\n"));
            Err(ShipyardError::Build(summarize(&diagnostics, exit.code())))
        }
    }

    fn backend_name(&self) -> &'static str {
        "buildkit"
    }
}

async fn abort(child: &mut Child) -> ShipyardError {
    debug!("Cancelling buildctl");
    let _ = child.start_kill();
    let _ = child.wait().await;
    ShipyardError::Cancelled { stage: "build" }
}

fn push_diagnostic(diagnostics: &mut Vec<String>, line: String) {
    if diagnostics.len() == DIAGNOSTIC_TAIL_LINES {
        diagnostics.remove(0);
    }
    diagnostics.push(line);
}

/// One-line failure summary: buildctl's final `error:` line if present
fn summarize(diagnostics: &[String], code: Option<i32>) -> String {
    let last_error = diagnostics
        .iter()
        .rev()
        .find_map(|l| l.trim().strip_prefix("error: "))
        .or_else(|| diagnostics.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty()));

    match (last_error, code) {
        (Some(msg), _) => msg.to_string(),
        (None, Some(code)) => format!("buildctl exited with code {}", code),
        (None, None) => "buildctl terminated by signal".to_string(),
    }
}

/// Arguments for `buildctl build`
pub(crate) fn build_args(config: &SolveConfiguration) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "--frontend".to_string(),
        config.frontend.name().to_string(),
    ];

    for (name, path) in &config.named_resources {
        args.push("--local".to_string());
        args.push(format!("{}={}", name, path.display()));
    }

    for (key, value) in &config.frontend_attrs {
        args.push("--opt".to_string());
        args.push(format!("{}={}", key, value));
    }

    for export in &config.exports {
        let mut fields = vec!["type=image".to_string()];
        fields.extend(
            export
                .exporter_attrs()
                .into_iter()
                .map(|(k, v)| csv_field(&format!("{}={}", k, v))),
        );
        args.push("--output".to_string());
        args.push(fields.join(","));
    }

    args.push("--progress".to_string());
    args.push("rawjson".to_string());
    args
}

/// Quote a field for buildctl's CSV-style `--output` parser
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct RawSolveStatus {
    #[serde(default)]
    vertexes: Vec<RawVertex>,
    #[serde(default)]
    statuses: Vec<RawVertexStatus>,
    #[serde(default)]
    logs: Vec<RawVertexLog>,
    #[serde(default)]
    warnings: Vec<RawVertexWarning>,
}

#[derive(Debug, Deserialize)]
struct RawVertex {
    digest: String,
    #[serde(default)]
    name: String,
    started: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    #[serde(default)]
    cached: bool,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct RawVertexStatus {
    id: String,
    #[serde(default)]
    vertex: String,
    #[serde(default)]
    current: i64,
    #[serde(default)]
    total: i64,
    completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawVertexLog {
    #[serde(default)]
    vertex: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct RawVertexWarning {
    #[serde(default)]
    vertex: String,
    #[serde(default)]
    short: String,
}

fn decode(data: &str) -> String {
    match STANDARD.decode(data) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => data.to_string(),
    }
}

/// Parse one `--progress rawjson` line; `None` for non-JSON output
pub(crate) fn parse_status_line(line: &str) -> Option<Vec<StatusEvent>> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let raw: RawSolveStatus = serde_json::from_str(trimmed).ok()?;

    let mut events = Vec::with_capacity(
        raw.vertexes.len() + raw.statuses.len() + raw.logs.len() + raw.warnings.len(),
    );
    events.extend(raw.vertexes.into_iter().map(|v| {
        StatusEvent::Vertex(VertexUpdate {
            digest: v.digest,
            name: v.name,
            started: v.started,
            completed: v.completed,
            cached: v.cached,
            error: (!v.error.is_empty()).then_some(v.error),
        })
    }));
    events.extend(raw.statuses.into_iter().map(|s| StatusEvent::Progress {
        vertex: s.vertex,
        id: s.id,
        current: s.current,
        total: s.total,
        completed: s.completed.is_some(),
    }));
    events.extend(raw.logs.into_iter().map(|l| StatusEvent::Log {
        vertex: l.vertex,
        data: decode(&l.data),
    }));
    events.extend(raw.warnings.into_iter().map(|w| StatusEvent::Warning {
        vertex: w.vertex,
        message: decode(&w.short),
    }));
    Some(events)
}
