//! Status events streamed from a solve

use chrono::{DateTime, Utc};

/// One node of the build graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexUpdate {
    pub digest: String,
    pub name: String,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub cached: bool,
    pub error: Option<String>,
}

impl VertexUpdate {
    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }
}

/// A progress update for a build graph step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Vertex(VertexUpdate),
    /// Byte or item counters, e.g. a layer download
    Progress {
        vertex: String,
        id: String,
        current: i64,
        total: i64,
        completed: bool,
    },
    Log { vertex: String, data: String },
    Warning { vertex: String, message: String },
}

impl StatusEvent {
    /// Digest of the vertex the event belongs to
    pub fn vertex(&self) -> &str {
        match self {
            Self::Vertex(v) => &v.digest,
            Self::Progress { vertex, .. } | Self::Log { vertex, .. } | Self::Warning { vertex, .. } => {
                vertex
            }
        }
    }
}
