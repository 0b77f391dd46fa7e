//! Runtime context for one pipeline invocation

use crate::cache::{self, CacheVolume};
use crate::container::{ContainerState, Secret};
use crate::error::{StepError, StepResult};
use crate::runtime::cancel::CancelSignal;
use crate::runtime::client::BuildClient;
use crate::runtime::error_tail;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Shared, read-only state for one pipeline invocation.
///
/// Holds the build client, the working-directory root, secrets captured from
/// the host at construction and the caller's cancellation signal. Cloning is
/// cheap and every clone sees the same values.
#[derive(Clone)]
pub struct RuntimeContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    client: Arc<dyn BuildClient>,
    workdir: PathBuf,
    secrets: BTreeMap<String, Secret>,
    cancel: CancelSignal,
    invocation: Uuid,
}

impl RuntimeContext {
    /// Start building a context around a client and working directory
    pub fn builder(client: Arc<dyn BuildClient>, workdir: impl Into<PathBuf>) -> RuntimeContextBuilder {
        RuntimeContextBuilder {
            client,
            workdir: workdir.into(),
            host_secrets: Vec::new(),
            secrets: BTreeMap::new(),
            cancel: None,
        }
    }

    pub fn client(&self) -> &dyn BuildClient {
        self.inner.client.as_ref()
    }

    pub fn workdir(&self) -> &Path {
        &self.inner.workdir
    }

    /// Identifier attached to log lines of this invocation
    pub fn invocation_id(&self) -> Uuid {
        self.inner.invocation
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.inner.cancel
    }

    /// A secret captured when the context was built
    pub fn secret(&self, name: &str) -> StepResult<Secret> {
        self.inner
            .secrets
            .get(name)
            .cloned()
            .ok_or_else(|| StepError::SecretNotFound(name.to_string()))
    }

    /// Race `fut` against the invocation's cancellation signal
    pub async fn guard<F, T>(&self, fut: F) -> StepResult<T>
    where
        F: Future<Output = StepResult<T>>,
    {
        self.inner.cancel.guard(fut).await
    }

    /// Resolve the cache volume keyed by `files` under the working directory
    pub async fn resolve_cache_volume(&self, prefix: &str, files: &[&str]) -> StepResult<CacheVolume> {
        cache::resolve_cache_volume(self.client(), prefix, self.workdir(), files, self.cancel_signal())
            .await
    }

    /// Execute the container and return its stdout.
    ///
    /// A non-zero exit, or a container that could not start, is an
    /// `Execution` error carrying the tail of the output.
    pub async fn stdout(&self, state: &ContainerState) -> StepResult<String> {
        self.client().ensure_ready().await?;

        info!(
            invocation = %self.inner.invocation,
            image = state.image(),
            steps = state.steps().len(),
            "Executing container via {}",
            self.client().client_name()
        );

        if self.inner.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        // The client observes cancellation itself so it can clean up first.
        let output = match self.client().execute(state, self.cancel_signal()).await {
            Ok(output) => output,
            Err(StepError::CommandFailed { command, source }) => {
                return Err(StepError::Execution {
                    code: None,
                    output: format!("{}: {}", command, source),
                })
            }
            Err(e) => return Err(e),
        };

        if output.success() {
            debug!("Container exited successfully");
            Ok(output.stdout)
        } else {
            Err(StepError::Execution {
                code: output.exit_code,
                output: error_tail(&output.stdout, &output.stderr),
            })
        }
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("client", &self.inner.client.client_name())
            .field("workdir", &self.inner.workdir)
            .field("secrets", &self.inner.secrets.keys().collect::<Vec<_>>())
            .field("invocation", &self.inner.invocation)
            .finish()
    }
}

/// Builder for `RuntimeContext`
pub struct RuntimeContextBuilder {
    client: Arc<dyn BuildClient>,
    workdir: PathBuf,
    host_secrets: Vec<String>,
    secrets: BTreeMap<String, Secret>,
    cancel: Option<CancelSignal>,
}

impl RuntimeContextBuilder {
    /// Capture a host environment variable as a secret when `build` runs.
    ///
    /// Variables that are not set are skipped; asking for them later fails
    /// with `SecretNotFound`.
    pub fn host_secret(mut self, name: impl Into<String>) -> Self {
        self.host_secrets.push(name.into());
        self
    }

    /// Provide a secret value directly
    pub fn secret(mut self, secret: Secret) -> Self {
        self.secrets.insert(secret.name().to_string(), secret);
        self
    }

    /// Observe the caller's cancellation signal
    pub fn cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> RuntimeContext {
        let mut secrets = self.secrets;

        for name in self.host_secrets {
            match std::env::var(&name) {
                Ok(value) if !value.is_empty() => {
                    debug!("Captured host secret {}", name);
                    secrets.insert(name.clone(), Secret::new(name, value));
                }
                _ => debug!("Host secret {} not set", name),
            }
        }

        RuntimeContext {
            inner: Arc::new(ContextInner {
                client: self.client,
                workdir: self.workdir,
                secrets,
                cancel: self.cancel.unwrap_or_else(CancelSignal::never),
                invocation: Uuid::new_v4(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::RecordingClient;
    use serial_test::serial;

    fn context(client: RecordingClient) -> RuntimeContext {
        RuntimeContext::builder(Arc::new(client), "/work").build()
    }

    #[test]
    fn missing_secret_is_error() {
        let ctx = context(RecordingClient::new());
        assert!(matches!(
            ctx.secret("GITHUB_TOKEN"),
            Err(StepError::SecretNotFound(ref name)) if name == "GITHUB_TOKEN"
        ));
    }

    #[test]
    #[serial]
    fn host_secret_captured_once() {
        std::env::set_var("STEPWRIGHT_TEST_TOKEN", "first");
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), "/work")
            .host_secret("STEPWRIGHT_TEST_TOKEN")
            .build();
        std::env::set_var("STEPWRIGHT_TEST_TOKEN", "second");

        let secret = ctx.secret("STEPWRIGHT_TEST_TOKEN").unwrap();
        assert_eq!(secret.expose(), "first");

        std::env::remove_var("STEPWRIGHT_TEST_TOKEN");
    }

    #[test]
    #[serial]
    fn unset_host_secret_is_skipped() {
        std::env::remove_var("STEPWRIGHT_TEST_ABSENT");
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), "/work")
            .host_secret("STEPWRIGHT_TEST_ABSENT")
            .build();
        assert!(ctx.secret("STEPWRIGHT_TEST_ABSENT").is_err());
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), "/work")
            .secret(Secret::new("TOKEN", "hunter2"))
            .build();
        let rendered = format!("{:?}", ctx);
        assert!(rendered.contains("TOKEN"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn stdout_returns_output_on_success() {
        let ctx = context(RecordingClient::new().with_stdout("v1.2.3\n"));
        let state = ContainerState::from_image("alpine").with_exec(["echo"]);
        assert_eq!(ctx.stdout(&state).await.unwrap(), "v1.2.3\n");
    }

    #[tokio::test]
    async fn stdout_maps_non_zero_exit() {
        let ctx = context(RecordingClient::new().with_unreachable_host("nowhere.invalid"));
        let state = ContainerState::from_image("alpine")
            .with_exec(["curl", "https://nowhere.invalid/file"]);

        let err = ctx.stdout(&state).await.unwrap_err();
        assert!(matches!(err, StepError::Execution { code: Some(6), .. }));
    }

    #[tokio::test]
    async fn stdout_observes_cancellation() {
        let (handle, signal) = crate::runtime::cancel_pair();
        let client = Arc::new(RecordingClient::new());
        let ctx = RuntimeContext::builder(client.clone(), "/work")
            .cancel_signal(signal)
            .build();
        handle.cancel();

        let err = ctx
            .stdout(&ContainerState::from_image("alpine"))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Cancelled));
        assert!(client.executed().is_empty());
    }

    #[tokio::test]
    async fn cancelling_a_running_container_tears_it_down() {
        let (handle, signal) = crate::runtime::cancel_pair();
        let client = Arc::new(RecordingClient::new().with_hanging_exec());
        let ctx = RuntimeContext::builder(client.clone(), "/work")
            .cancel_signal(signal)
            .build();

        let state = ContainerState::from_image("alpine").with_exec(["sleep", "600"]);
        let run = tokio::spawn(async move { ctx.stdout(&state).await });

        while client.executed().is_empty() {
            tokio::task::yield_now().await;
        }
        handle.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, StepError::Cancelled));
        assert_eq!(client.torn_down(), 1);
    }
}
