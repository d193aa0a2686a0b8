//! Deterministic image tags derived from resolved commits

use crate::error::{ShipyardError, ShipyardResult};
use std::fmt;

/// Number of commit hash characters appended to the push location
pub const SHORT_HASH_LEN: usize = 7;

/// Full commit identifier resolved from a working tree's HEAD
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<git2::Oid> for CommitHash {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image reference a build is exported and pushed under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageTag(String);

impl ImageTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive `<push_location>-<first 7 chars of commit>`.
///
/// Pure and total for valid input; the tag is never built from a ref name,
/// so rebuilding the same commit always yields the same tag.
pub fn resolve_tag(push_location: &str, commit: &str) -> ShipyardResult<ImageTag> {
    if push_location.is_empty() {
        return Err(ShipyardError::InvalidArgument(
            "push location must not be empty".to_string(),
        ));
    }

    let short: String = commit.chars().take(SHORT_HASH_LEN).collect();
    if short.chars().count() < SHORT_HASH_LEN {
        return Err(ShipyardError::InvalidArgument(format!(
            "commit hash '{}' is shorter than {} characters",
            commit, SHORT_HASH_LEN
        )));
    }

    Ok(ImageTag(format!("{}-{}", push_location, short)))
}
