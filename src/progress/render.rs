//! Progress renderers

use crate::progress::event::{StatusEvent, VertexUpdate};
use crate::progress::ProgressSummary;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

/// Draws status events on an operator-facing sink
pub trait Renderer: Send {
    /// Render one event
    fn render(&mut self, event: &StatusEvent) -> io::Result<()>;

    /// The stream closed after a complete build
    fn finish(&mut self, summary: &ProgressSummary) -> io::Result<()>;

    /// The build was cancelled; leave the display in a sane state
    fn abort(&mut self);
}

/// Line-oriented output in the style of `buildctl --progress plain`
pub struct PlainRenderer<W: Write + Send> {
    out: W,
    numbers: HashMap<String, usize>,
    announced: HashSet<String>,
    finished: HashSet<String>,
}

impl<W: Write + Send> PlainRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            numbers: HashMap::new(),
            announced: HashSet::new(),
            finished: HashSet::new(),
        }
    }

    /// Consume the renderer and return its sink
    pub fn into_inner(self) -> W {
        self.out
    }

    fn number(&mut self, digest: &str) -> usize {
        let next = self.numbers.len() + 1;
        *self.numbers.entry(digest.to_string()).or_insert(next)
    }

    fn render_vertex(&mut self, v: &VertexUpdate) -> io::Result<()> {
        let n = self.number(&v.digest);

        if (v.started.is_some() || v.cached) && self.announced.insert(v.digest.clone()) {
            writeln!(self.out, "#{} {}", n, v.name)?;
        }

        if let Some(ref error) = v.error {
            if self.finished.insert(v.digest.clone()) {
                writeln!(self.out, "#{} ERROR: {}", n, error)?;
            }
        } else if v.cached {
            if self.finished.insert(v.digest.clone()) {
                writeln!(self.out, "#{} CACHED", n)?;
            }
        } else if let Some(completed) = v.completed {
            if self.finished.insert(v.digest.clone()) {
                match v.started {
                    Some(started) => {
                        let secs = (completed - started).num_milliseconds().max(0) as f64 / 1000.0;
                        writeln!(self.out, "#{} DONE {:.1}s", n, secs)?;
                    }
                    None => writeln!(self.out, "#{} DONE", n)?,
                }
            }
        }
        Ok(())
    }
}

impl<W: Write + Send> Renderer for PlainRenderer<W> {
    fn render(&mut self, event: &StatusEvent) -> io::Result<()> {
        match event {
            StatusEvent::Vertex(v) => self.render_vertex(v)?,
            StatusEvent::Progress {
                id,
                current,
                total,
                completed,
                ..
            } => {
                if *completed {
                    let n = self.number(event.vertex());
                    if *total > 0 {
                        writeln!(self.out, "#{} {} {}/{} done", n, id, current, total)?;
                    } else {
                        writeln!(self.out, "#{} {} done", n, id)?;
                    }
                }
            }
            StatusEvent::Log { data, .. } => {
                let n = self.number(event.vertex());
                for line in data.lines().filter(|l| !l.trim().is_empty()) {
                    writeln!(self.out, "#{} {}", n, line)?;
                }
            }
            StatusEvent::Warning { message, .. } => {
                let n = self.number(event.vertex());
                writeln!(self.out, "#{} WARN: {}", n, message)?;
            }
        }
        self.out.flush()
    }

    fn finish(&mut self, _summary: &ProgressSummary) -> io::Result<()> {
        self.out.flush()
    }

    fn abort(&mut self) {
        let _ = writeln!(self.out, "build cancelled");
        let _ = self.out.flush();
    }
}

/// Single progress bar counting finished build steps
pub struct TtyRenderer {
    bar: ProgressBar,
    seen: HashSet<String>,
    done: HashSet<String>,
}

impl TtyRenderer {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.cyan} Building {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}")
        {
            bar.set_style(
                style
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                    .progress_chars("━╸─"),
            );
        }
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self {
            bar,
            seen: HashSet::new(),
            done: HashSet::new(),
        }
    }
}

impl Renderer for TtyRenderer {
    fn render(&mut self, event: &StatusEvent) -> io::Result<()> {
        match event {
            StatusEvent::Vertex(v) => {
                if self.seen.insert(v.digest.clone()) {
                    self.bar.set_length(self.seen.len() as u64);
                }
                if let Some(ref error) = v.error {
                    self.bar.println(format!("ERROR {}: {}", v.name, error));
                }
                if v.is_completed() || v.cached {
                    if self.done.insert(v.digest.clone()) {
                        self.bar.set_position(self.done.len() as u64);
                    }
                } else if v.started.is_some() {
                    self.bar.set_message(truncate(&v.name, 60));
                }
            }
            StatusEvent::Warning { message, .. } => {
                self.bar.println(format!("WARN {}", message));
            }
            StatusEvent::Progress { .. } | StatusEvent::Log { .. } => {}
        }
        Ok(())
    }

    fn finish(&mut self, _summary: &ProgressSummary) -> io::Result<()> {
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
        Ok(())
    }

    fn abort(&mut self) {
        self.bar.disable_steady_tick();
        self.bar.abandon_with_message("cancelled");
    }
}

/// Renders nothing
#[derive(Debug, Default)]
pub struct QuietRenderer;

impl Renderer for QuietRenderer {
    fn render(&mut self, _event: &StatusEvent) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _summary: &ProgressSummary) -> io::Result<()> {
        Ok(())
    }

    fn abort(&mut self) {}
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
