//! Shipyard - one-shot image build driver
//!
//! Clones a repository into a per-image cache, builds it with BuildKit and
//! pushes the result under `<push location>-<short commit>`.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod request;
pub mod source;
pub mod tag;
pub mod ui;

pub use error::{ShipyardError, ShipyardResult};
