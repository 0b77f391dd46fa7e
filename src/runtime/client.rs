//! Build client abstraction
//!
//! The build client owns everything this crate does not: the volume
//! namespace, image metadata and actual execution.

use crate::cache::{CacheKey, CacheVolume};
use crate::container::ContainerState;
use crate::error::StepResult;
use crate::runtime::cancel::CancelSignal;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Output of running a container specification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Abstract container engine interface
///
/// Implementations must make `volume` idempotent per name: two calls with
/// the same key, from this process or any other, refer to the same storage.
#[async_trait]
pub trait BuildClient: Send + Sync {
    /// Ensure the engine is usable (binary present, daemon reachable, ...)
    async fn ensure_ready(&self) -> StepResult<()> {
        Ok(())
    }

    /// Look up the volume for `key`, creating it empty if it doesn't exist
    async fn volume(&self, key: &CacheKey) -> StepResult<CacheVolume>;

    /// Environment baked into a base image
    async fn image_env(&self, image: &str) -> StepResult<BTreeMap<String, String>>;

    /// Run the container's exec steps and collect the output.
    ///
    /// On cancellation, tear down whatever the run started (container,
    /// secrets) and only then return `Cancelled`.
    async fn execute(&self, state: &ContainerState, cancel: &CancelSignal) -> StepResult<ExecOutput>;

    /// Get the human-readable client name for display
    fn client_name(&self) -> &'static str;
}
