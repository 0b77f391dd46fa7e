//! In-memory build client (testing only)
//!
//! `RecordingClient` satisfies the BuildClient contract without a container
//! engine: volumes live in a map, executed states are recorded, and
//! downloads from configured hosts fail the way `curl` would.

use crate::cache::{CacheKey, CacheVolume};
use crate::container::ContainerState;
use crate::error::{StepError, StepResult};
use crate::runtime::cancel::CancelSignal;
use crate::runtime::client::{BuildClient, ExecOutput};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// curl's exit code for "could not resolve host"
const CURL_RESOLVE_FAILED: i32 = 6;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build client that records every request in memory
#[derive(Debug, Default)]
pub struct RecordingClient {
    volumes: Mutex<BTreeMap<String, CacheVolume>>,
    requests: Mutex<Vec<String>>,
    created: Mutex<usize>,
    executed: Mutex<Vec<ContainerState>>,
    torn_down: Mutex<usize>,
    hanging_exec: bool,
    image_env: BTreeMap<String, BTreeMap<String, String>>,
    unreachable_hosts: Vec<String>,
    failing_volumes: bool,
    stdout: String,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `name=value` in the environment of `image`
    pub fn with_image_env(mut self, image: &str, name: &str, value: &str) -> Self {
        self.image_env
            .entry(image.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Fail any exec step that mentions `host`, like an unresolvable download
    pub fn with_unreachable_host(mut self, host: &str) -> Self {
        self.unreachable_hosts.push(host.to_string());
        self
    }

    /// Fail every volume request
    pub fn with_failing_volumes(mut self) -> Self {
        self.failing_volumes = true;
        self
    }

    /// Keep every execution running until it is cancelled
    pub fn with_hanging_exec(mut self) -> Self {
        self.hanging_exec = true;
        self
    }

    /// Stdout returned by successful executions
    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    /// Number of distinct volumes created
    pub fn created_volume_count(&self) -> usize {
        *lock(&self.created)
    }

    /// Volume names requested, in order
    pub fn volume_requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    /// Executions cancelled and torn down while running
    pub fn torn_down(&self) -> usize {
        *lock(&self.torn_down)
    }

    /// Container states passed to `execute`, in order
    pub fn executed(&self) -> Vec<ContainerState> {
        lock(&self.executed).clone()
    }

    fn unreachable_host_in(&self, state: &ContainerState) -> Option<&str> {
        self.unreachable_hosts
            .iter()
            .find(|host| {
                state
                    .steps()
                    .iter()
                    .flatten()
                    .any(|arg| arg.contains(host.as_str()))
            })
            .map(String::as_str)
    }
}

#[async_trait]
impl BuildClient for RecordingClient {
    async fn volume(&self, key: &CacheKey) -> StepResult<CacheVolume> {
        let name = key.volume_name();
        lock(&self.requests).push(name.clone());

        if self.failing_volumes {
            return Err(StepError::Internal(format!("volume store unavailable for {}", name)));
        }

        // Lookup and insert under one lock so racing callers share a volume.
        let mut volumes = lock(&self.volumes);
        let volume = volumes
            .entry(name)
            .or_insert_with(|| {
                *lock(&self.created) += 1;
                CacheVolume::for_key(key)
            })
            .clone();
        Ok(volume)
    }

    async fn image_env(&self, image: &str) -> StepResult<BTreeMap<String, String>> {
        Ok(self.image_env.get(image).cloned().unwrap_or_default())
    }

    async fn execute(&self, state: &ContainerState, cancel: &CancelSignal) -> StepResult<ExecOutput> {
        lock(&self.executed).push(state.clone());

        if self.hanging_exec {
            cancel.cancelled().await;
            *lock(&self.torn_down) += 1;
            return Err(StepError::Cancelled);
        }

        if let Some(host) = self.unreachable_host_in(state) {
            return Ok(ExecOutput {
                exit_code: Some(CURL_RESOLVE_FAILED),
                stdout: String::new(),
                stderr: format!("curl: (6) Could not resolve host: {}", host),
            });
        }

        Ok(ExecOutput {
            exit_code: Some(0),
            stdout: self.stdout.clone(),
            stderr: String::new(),
        })
    }

    fn client_name(&self) -> &'static str {
        "Recording"
    }
}
