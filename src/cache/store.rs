//! Filesystem-backed cache store

use crate::error::{ShipyardError, ShipyardResult};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A working-tree directory owned by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Push location the entry belongs to
    pub key: String,
    /// Directory holding the working tree
    pub path: PathBuf,
}

/// Keyed store of working trees
pub trait CacheStore: Send + Sync {
    /// Deterministic directory for a key; does not touch the filesystem
    fn path_for(&self, key: &str) -> PathBuf;

    /// Make sure the directory for `key` exists
    fn ensure(&self, key: &str) -> ShipyardResult<CacheEntry>;

    /// Existing entries, sorted by key
    fn entries(&self) -> ShipyardResult<Vec<CacheEntry>>;
}

/// Cache store rooted at an explicit directory
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CacheStore for FsCacheStore {
    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }

    fn ensure(&self, key: &str) -> ShipyardResult<CacheEntry> {
        let path = self.path_for(key);
        fs::create_dir_all(&path).map_err(|e| ShipyardError::Filesystem {
            path: path.clone(),
            source: e,
        })?;
        debug!("Cache entry ready: {}", path.display());

        Ok(CacheEntry {
            key: key.to_string(),
            path,
        })
    }

    fn entries(&self) -> ShipyardResult<Vec<CacheEntry>> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ShipyardError::io(
                    format!("listing cache root {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| ShipyardError::io("reading cache entry", e))?;
            if !item.path().is_dir() {
                continue;
            }
            let name = item.file_name();
            // Foreign directories that are not valid encodings are skipped
            if let Some(key) = name.to_str().and_then(decode_key) {
                entries.push(CacheEntry {
                    key,
                    path: item.path(),
                });
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

/// Encode a push location into a single, filesystem-safe path segment
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            let _ = write!(out, "_{:02x}", b);
        }
    }
    out
}

/// Invert [`encode_key`]; `None` if `name` is not a valid encoding
pub fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'_' {
            let hex = name.get(i + 1..i + 3)?;
            if !hex.bytes().all(|h| h.is_ascii_digit() || (b'a'..=b'f').contains(&h)) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b);
            i += 1;
        } else {
            return None;
        }
    }
    String::from_utf8(out).ok()
}
