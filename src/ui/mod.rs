//! Terminal output helpers
//!
//! Styled status lines with plain fallbacks for CI and piped output.

mod context;
mod output;

pub use context::UiContext;
pub use output::{key_value, step_ok, step_warn};
