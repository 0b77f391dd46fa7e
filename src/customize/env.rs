//! Environment customizers

use crate::container::{ContainerState, DEFAULT_PATH};
use crate::customize::Customizer;
use crate::error::StepResult;
use crate::runtime::RuntimeContext;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Set a group of environment variables, overwriting existing values
#[derive(Debug, Clone)]
pub struct EnvVariables {
    vars: BTreeMap<String, String>,
}

impl EnvVariables {
    pub fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl Customizer for EnvVariables {
    fn name(&self) -> String {
        "env-variables".to_string()
    }

    async fn apply(&self, _ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        Ok(self
            .vars
            .iter()
            .fold(state, |state, (k, v)| state.with_env_variable(k.as_str(), v.as_str())))
    }
}

/// Append a directory to PATH unless it is already there
#[derive(Debug, Clone)]
pub struct AppendToPath {
    dir: String,
}

impl AppendToPath {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Customizer for AppendToPath {
    fn name(&self) -> String {
        format!("append-to-path({})", self.dir)
    }

    async fn apply(&self, ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        // State env first, then what the base image ships with.
        let current = match state.env_variable("PATH") {
            Some(path) => path.to_string(),
            None => ctx
                .client()
                .image_env(state.image())
                .await?
                .remove("PATH")
                .unwrap_or_else(|| DEFAULT_PATH.to_string()),
        };

        if current.split(':').any(|entry| entry == self.dir) {
            return Ok(state);
        }

        let path = if current.is_empty() {
            self.dir.clone()
        } else {
            format!("{}:{}", current, self.dir)
        };

        Ok(state.with_env_variable("PATH", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::RecordingClient;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context(client: RecordingClient) -> RuntimeContext {
        RuntimeContext::builder(Arc::new(client), "/work").build()
    }

    #[tokio::test]
    async fn env_variables_are_order_independent() {
        let mut map = HashMap::new();
        map.insert("B", "2");
        map.insert("A", "1");
        map.insert("C", "3");

        let ctx = context(RecordingClient::new());
        let state = EnvVariables::new(map)
            .apply(&ctx, ContainerState::from_image("alpine"))
            .await
            .unwrap();

        assert_eq!(state.env_variable("A"), Some("1"));
        assert_eq!(state.env_variable("B"), Some("2"));
        assert_eq!(state.env_variable("C"), Some("3"));
    }

    #[tokio::test]
    async fn env_variables_overwrite_existing() {
        let ctx = context(RecordingClient::new());
        let base = ContainerState::from_image("alpine").with_env_variable("A", "old");
        let state = EnvVariables::new([("A", "new")]).apply(&ctx, base).await.unwrap();
        assert_eq!(state.env_variable("A"), Some("new"));
    }

    #[tokio::test]
    async fn append_uses_image_path() {
        let ctx = context(RecordingClient::new().with_image_env("golang", "PATH", "/usr/bin:/bin"));
        let state = AppendToPath::new("/usr/local/go/bin")
            .apply(&ctx, ContainerState::from_image("golang"))
            .await
            .unwrap();
        assert_eq!(state.env_variable("PATH"), Some("/usr/bin:/bin:/usr/local/go/bin"));
    }

    #[tokio::test]
    async fn append_falls_back_to_default_path() {
        let ctx = context(RecordingClient::new());
        let state = AppendToPath::new("/opt/bin")
            .apply(&ctx, ContainerState::from_image("scratch"))
            .await
            .unwrap();
        assert_eq!(
            state.env_variable("PATH"),
            Some(format!("{}:/opt/bin", DEFAULT_PATH).as_str())
        );
    }

    #[tokio::test]
    async fn append_is_idempotent() {
        let ctx = context(RecordingClient::new());
        let append = AppendToPath::new("/opt/bin");

        let once = append
            .apply(&ctx, ContainerState::from_image("alpine"))
            .await
            .unwrap();
        let twice = append.apply(&ctx, once.clone()).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.env_variable("PATH").unwrap().matches("/opt/bin").count(), 1);
    }
}
