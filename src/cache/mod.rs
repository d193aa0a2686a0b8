//! Working-tree cache keyed by push location
//!
//! Each push location owns exactly one directory under the cache root.
//! Entries outlive a single build and are reused by later runs; nothing in
//! the build path deletes them.
//!
//! # Key encoding
//!
//! | Byte | Encoded as |
//! |------|------------|
//! | `A-Z a-z 0-9 -` | itself |
//! | anything else | `_` + two lowercase hex digits |
//!
//! The encoding is injective and yields a single path segment, so distinct
//! push locations never share a working tree.

pub mod store;

pub use store::{decode_key, encode_key, CacheEntry, CacheStore, FsCacheStore};
