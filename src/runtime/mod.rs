//! Build clients and the per-invocation runtime context
//!
//! Provides a trait for the container engine that executes prepared
//! specifications, plus the context shared by every customizer:
//! - `PodmanClient`: rootless Podman through its CLI
//! - `RecordingClient`: in-memory client for tests

mod cancel;
mod client;
mod context;
pub mod fake;
pub mod podman;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use client::{BuildClient, ExecOutput};
pub use context::{RuntimeContext, RuntimeContextBuilder};
pub use podman::{PodmanClient, RunHandle};

/// Max number of output lines to include in execution error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of container output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn error_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tail_keeps_last_lines() {
        let stdout: String = (0..60).map(|i| format!("line {}\n", i)).collect();
        let tail = error_tail(&stdout, "boom");

        assert_eq!(tail.lines().count(), ERROR_TAIL_LINES);
        assert!(tail.ends_with("boom"));
        assert!(!tail.contains("line 10\n"));
    }

    #[test]
    fn error_tail_short_output() {
        assert_eq!(error_tail("a", "b"), "a\nb");
    }
}
