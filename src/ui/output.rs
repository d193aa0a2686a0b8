//! Output functions for consistent CLI formatting

use super::context::UiContext;
use console::style;

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {}", style("✓").green(), message);
    } else {
        eprintln!("{} {}", style("[OK]").green(), message);
    }
}

/// Display a warning step
pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {}", style("!").yellow(), message);
    } else {
        eprintln!("{} {}", style("[WARN]").yellow(), message);
    }
}

/// Print styled key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        eprintln!("  {}: {}", style(key).dim(), value);
    } else {
        eprintln!("  {}: {}", key, value);
    }
}
