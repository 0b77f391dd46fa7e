//! Cache mount customizers

use crate::cache::{hash_file_set, resolve_key, CacheKey, CacheVolume, FileSet};
use crate::container::ContainerState;
use crate::customize::Customizer;
use crate::error::StepResult;
use crate::runtime::RuntimeContext;
use async_trait::async_trait;
use std::path::Path;

/// Files that key the Go build and module caches
const GO_CACHE_FILES: [&str; 2] = ["go.mod", "go.sum"];

/// (key prefix, mount path, env var) for each Go cache
const GO_CACHES: [(&str, &str, &str); 2] = [
    ("go-build-", "/go/build-cache", "GOCACHE"),
    ("go-mod-", "/go/mod-cache", "GOMODCACHE"),
];

/// Mount a resolved cache volume, optionally exporting its path
#[derive(Debug, Clone)]
pub struct MountedCache {
    volume: CacheVolume,
    path: String,
    env_var: Option<String>,
}

impl MountedCache {
    pub fn new(volume: CacheVolume, path: impl Into<String>) -> Self {
        Self {
            volume,
            path: path.into(),
            env_var: None,
        }
    }

    /// Also set `name` to the mount path
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = Some(name.into());
        self
    }
}

#[async_trait]
impl Customizer for MountedCache {
    fn name(&self) -> String {
        format!("mounted-cache({} at {})", self.volume.name, self.path)
    }

    async fn apply(&self, _ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        let state = state.with_mounted_cache(self.path.as_str(), &self.volume);
        Ok(match &self.env_var {
            Some(name) => state.with_env_variable(name.as_str(), self.path.as_str()),
            None => state,
        })
    }
}

/// Mount Go build and module caches keyed by `go.mod` and `go.sum`.
///
/// Both files must exist under `path` (relative to the working directory).
#[derive(Debug, Clone)]
pub struct MountedGoCache {
    path: String,
}

impl MountedGoCache {
    /// An empty path means the working directory itself
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Customizer for MountedGoCache {
    fn name(&self) -> String {
        format!("mounted-go-cache({})", self.path)
    }

    async fn apply(&self, ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        let dir = if self.path.is_empty() { "." } else { self.path.as_str() };
        let files = GO_CACHE_FILES.iter().map(|f| Path::new(dir).join(f));
        let set = FileSet::new(ctx.workdir(), files)?.require_all();

        let hashed = hash_file_set(&set, ctx.cancel_signal()).await?;

        let mut state = state;
        for (prefix, mount, env_var) in GO_CACHES {
            let key = CacheKey::new(prefix, hashed.digest)?;
            let volume = resolve_key(ctx.client(), &key, ctx.cancel_signal()).await?;
            state = state
                .with_env_variable(env_var, mount)
                .with_mounted_cache(mount, &volume);
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::runtime::fake::RecordingClient;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn mounted_cache_sets_env_var() {
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), "/work").build();
        let volume = CacheVolume::named("pre-commit-abc");

        let state = MountedCache::new(volume, "/pre-commit-cache")
            .with_env_var("PRE_COMMIT_HOME")
            .apply(&ctx, ContainerState::from_image("python"))
            .await
            .unwrap();

        assert_eq!(state.env_variable("PRE_COMMIT_HOME"), Some("/pre-commit-cache"));
        assert_eq!(state.cache_at("/pre-commit-cache").unwrap().volume, "pre-commit-abc");
    }

    #[tokio::test]
    async fn mounted_cache_twice_replaces() {
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), "/work").build();
        let mount = MountedCache::new(CacheVolume::named("v1"), "/cache");

        let once = mount.apply(&ctx, ContainerState::from_image("alpine")).await.unwrap();
        let twice = mount.apply(&ctx, once).await.unwrap();

        assert_eq!(twice.caches().count(), 1);
    }

    #[tokio::test]
    async fn go_cache_mounts_both_volumes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("svc")).unwrap();
        fs::write(dir.path().join("svc/go.mod"), "module x").unwrap();
        fs::write(dir.path().join("svc/go.sum"), "").unwrap();

        let client = Arc::new(RecordingClient::new());
        let ctx = RuntimeContext::builder(client.clone(), dir.path()).build();

        let state = MountedGoCache::new("svc")
            .apply(&ctx, ContainerState::from_image("golang"))
            .await
            .unwrap();

        assert_eq!(state.env_variable("GOCACHE"), Some("/go/build-cache"));
        assert_eq!(state.env_variable("GOMODCACHE"), Some("/go/mod-cache"));
        assert!(state.cache_at("/go/build-cache").unwrap().volume.starts_with("go-build-"));
        assert!(state.cache_at("/go/mod-cache").unwrap().volume.starts_with("go-mod-"));
        assert_eq!(client.created_volume_count(), 2);
    }

    #[tokio::test]
    async fn go_cache_requires_both_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module x").unwrap();

        let client = Arc::new(RecordingClient::new());
        let ctx = RuntimeContext::builder(client.clone(), dir.path()).build();

        let err = MountedGoCache::new("")
            .apply(&ctx, ContainerState::from_image("golang"))
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::MissingInputs { .. }));
        assert!(client.volume_requests().is_empty());
    }

    #[tokio::test]
    async fn go_cache_rejects_escaping_path() {
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), "/work").build();
        let err = MountedGoCache::new("../elsewhere")
            .apply(&ctx, ContainerState::from_image("golang"))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::PathInvalid { .. }));
    }
}
