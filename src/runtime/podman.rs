//! Podman build client
//!
//! Implements the BuildClient trait by rendering a ContainerState into a
//! `podman run --rm` invocation. Requires rootless Podman on the host.

use crate::cache::{labels, CacheKey, CacheVolume};
use crate::container::{ContainerState, Secret};
use crate::error::{StepError, StepResult};
use crate::runtime::cancel::CancelSignal;
use crate::runtime::client::{BuildClient, ExecOutput};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Host variable carrying a secret value into `podman secret create --env`
const SECRET_VALUE_ENV: &str = "STEPWRIGHT_SECRET_VALUE";

/// Names podman uses for one container run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    container: String,
}

impl RunHandle {
    /// Fresh, unique names for a new run
    pub fn new() -> Self {
        Self {
            container: format!("stepwright-{}", Uuid::new_v4()),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Podman secret holding environment variable `name` for this run
    pub fn secret_id(&self, name: &str) -> String {
        format!("{}-{}", self.container, name.to_ascii_lowercase())
    }
}

impl Default for RunHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Build client using the local `podman` binary
pub struct PodmanClient;

/// Entry of `podman volume ls --format json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeListing {
    name: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

impl PodmanClient {
    /// Create a new Podman client
    pub fn new() -> Self {
        Self
    }

    /// Check if Podman is installed
    async fn podman_installed() -> bool {
        Command::new("podman")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute a Podman command and return the output
    async fn exec(&self, args: &[&str]) -> StepResult<std::process::Output> {
        debug!("Executing: podman {:?}", args);

        Command::new("podman")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StepError::command_failed(format!("podman {:?}", args), e))
    }

    /// Check if image exists locally
    async fn image_exists(&self, image: &str) -> StepResult<bool> {
        let output = self.exec(&["image", "exists", image]).await?;
        Ok(output.status.success())
    }

    /// Pull an image
    async fn pull(&self, image: &str) -> StepResult<()> {
        info!("Pulling image: {}", image);

        let output = self.exec(&["pull", image]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(StepError::Execution {
                code: output.status.code(),
                output: format!("pulling {}: {}", image, stderr.trim()),
            })
        }
    }

    /// Store a secret value as a podman secret, passing it only through
    /// the child environment
    async fn create_secret(&self, id: &str, secret: &Secret) -> StepResult<()> {
        debug!("Creating podman secret {}", id);

        let output = Command::new("podman")
            .args(["secret", "create", "--env", id, SECRET_VALUE_ENV])
            .env(SECRET_VALUE_ENV, secret.expose())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StepError::command_failed("podman secret create", e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(StepError::User(format!(
                "podman secret create {} failed: {}",
                secret.name(),
                stderr.trim()
            )))
        }
    }

    /// Remove this run's secrets. Failures are logged, never returned.
    async fn remove_secrets(&self, state: &ContainerState, run: &RunHandle) {
        for name in state.secrets().keys() {
            let id = run.secret_id(name);
            match self.exec(&["secret", "rm", &id]).await {
                Ok(output) if output.status.success() => debug!("Removed podman secret {}", id),
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if !stderr.contains("no such secret") {
                        warn!("Failed to remove podman secret {}: {}", id, stderr.trim());
                    }
                }
                Err(e) => warn!("Failed to remove podman secret {}: {}", id, e),
            }
        }
    }

    /// Force-remove a container, killing it if it still runs
    async fn remove(&self, container: &str) -> StepResult<()> {
        debug!("Removing container: {}", container);

        let output = self.exec(&["rm", "-f", container]).await?;

        if output.status.success() {
            Ok(())
        } else {
            // Ignore error if container doesn't exist
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no such container") {
                Ok(())
            } else {
                Err(StepError::User(format!(
                    "podman rm {} failed: {}",
                    container,
                    stderr.trim()
                )))
            }
        }
    }

    /// Run the container, racing it against cancellation. A cancelled run
    /// is removed before `Cancelled` is returned, since the container is
    /// owned by conmon and outlives the killed `podman run` client.
    async fn run_container(
        &self,
        args: &[String],
        run: &RunHandle,
        cancel: &CancelSignal,
    ) -> StepResult<ExecOutput> {
        let child = Command::new("podman")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StepError::command_failed("podman run", e))?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(container = run.container(), "Cancelled, removing container");
                if let Err(e) = self.remove(run.container()).await {
                    warn!("{}", e);
                }
                Err(StepError::Cancelled)
            }
            output = child.wait_with_output() => {
                let output = output.map_err(|e| StepError::command_failed("podman run", e))?;
                Ok(ExecOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
        }
    }

    /// List cache volumes created by stepwright
    pub async fn list_volumes(&self) -> StepResult<Vec<CacheVolume>> {
        let filter = format!("label={}=true", labels::STEPWRIGHT_CACHE);
        let output = self
            .exec(&["volume", "ls", "--filter", &filter, "--format", "json"])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StepError::User(format!(
                "podman volume ls failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_volume_listing(&stdout)
    }

    /// Render the `podman run` arguments for a container state.
    ///
    /// Secret values are never part of the arguments, nor of the container's
    /// environment config: each secret is a podman secret created for this
    /// run and exposed with `--secret id,type=env,target=NAME`.
    pub fn run_args(state: &ContainerState, run: &RunHandle) -> StepResult<Vec<String>> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            run.container().to_string(),
        ];

        for (path, host) in state.directories() {
            args.push("-v".to_string());
            args.push(format!("{}:{}", host.display(), path));
        }

        for mount in state.caches() {
            args.push("-v".to_string());
            args.push(mount.volume_arg());
        }

        if let Some(workdir) = state.workdir() {
            args.push("-w".to_string());
            args.push(workdir.to_string());
        }

        for (name, value) in state.env() {
            args.push("-e".to_string());
            args.push(format!("{}={}", name, value));
        }

        for name in state.secrets().keys() {
            args.push("--secret".to_string());
            args.push(format!("{},type=env,target={}", run.secret_id(name), name));
        }

        let steps: Vec<&Vec<String>> = state.steps().iter().filter(|s| !s.is_empty()).collect();

        match steps.as_slice() {
            [] => args.push(state.image().to_string()),
            [single] => {
                args.push("--entrypoint".to_string());
                args.push(serde_json::to_string(&[&single[0]])?);
                args.push(state.image().to_string());
                args.extend(single[1..].iter().cloned());
            }
            many => {
                let script = many
                    .iter()
                    .map(|step| shell_words::join(step.iter()))
                    .collect::<Vec<_>>()
                    .join("\n");
                args.push("--entrypoint".to_string());
                args.push(r#"["/bin/sh","-ec"]"#.to_string());
                args.push(state.image().to_string());
                args.push(script);
            }
        }

        Ok(args)
    }
}

impl Default for PodmanClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_volume_listing(json: &str) -> StepResult<Vec<CacheVolume>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let listings: Vec<VolumeListing> = serde_json::from_str(json)?;
    Ok(listings
        .iter()
        .filter_map(|v| {
            let labels = v.labels.clone().unwrap_or_default();
            CacheVolume::from_labels(&v.name, &labels)
        })
        .collect())
}

fn parse_image_env(json: &str) -> StepResult<BTreeMap<String, String>> {
    let entries: Option<Vec<String>> = serde_json::from_str(json.trim())?;
    Ok(entries
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect())
}

#[async_trait]
impl BuildClient for PodmanClient {
    async fn ensure_ready(&self) -> StepResult<()> {
        if !Self::podman_installed().await {
            return Err(StepError::PodmanNotFound);
        }
        Ok(())
    }

    async fn volume(&self, key: &CacheKey) -> StepResult<CacheVolume> {
        let name = key.volume_name();

        // --ignore makes creation a no-op if the volume already exists, which
        // also covers concurrent first creation by parallel jobs.
        let mut args = vec![
            "volume".to_string(),
            "create".to_string(),
            "--ignore".to_string(),
        ];
        for (k, v) in key.labels() {
            args.push("--label".to_string());
            args.push(format!("{}={}", k, v));
        }
        args.push(name.clone());

        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.exec(&args_refs).await?;

        if output.status.success() {
            debug!("Volume ready: {}", name);
            Ok(CacheVolume::for_key(key))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(StepError::VolumeResolution {
                name,
                reason: stderr.trim().to_string(),
            })
        }
    }

    async fn image_env(&self, image: &str) -> StepResult<BTreeMap<String, String>> {
        if !self.image_exists(image).await? {
            self.pull(image).await?;
        }

        let output = self
            .exec(&["image", "inspect", "--format", "{{json .Config.Env}}", image])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StepError::User(format!(
                "podman image inspect {} failed: {}",
                image,
                stderr.trim()
            )));
        }

        parse_image_env(&String::from_utf8_lossy(&output.stdout))
    }

    async fn execute(&self, state: &ContainerState, cancel: &CancelSignal) -> StepResult<ExecOutput> {
        let run = RunHandle::new();
        let args = Self::run_args(state, &run)?;
        debug!("Running container: podman {:?}", args);

        let mut result = Ok(());
        for (name, secret) in state.secrets() {
            result = self.create_secret(&run.secret_id(name), secret).await;
            if result.is_err() {
                break;
            }
        }

        let output = match result {
            Ok(()) => self.run_container(&args, &run, cancel).await,
            Err(e) => Err(e),
        };

        self.remove_secrets(state, &run).await;
        output
    }

    fn client_name(&self) -> &'static str {
        "Podman"
    }
}
