//! Plain status lines

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

/// Display an error step
pub fn step_error(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {}", style("✗").red(), message);
    } else {
        eprintln!("{} {}", style("[FAIL]").red(), message);
    }
}

/// Display a key-value pair on stdout
pub fn key_value(key: &str, value: &str) {
    println!("  {:<12} {}", style(key).dim(), value);
}
