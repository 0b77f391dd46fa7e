//! Terminal feedback for the CLI
//!
//! Status goes to stderr so a step's stdout (a version string, hook
//! output) can be piped. Spinners only appear on interactive terminals;
//! CI gets plain `[OK]`/`[FAIL]` lines.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_error, step_ok};
pub use progress::TaskSpinner;
