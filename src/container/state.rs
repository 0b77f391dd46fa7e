//! Container state and secret handles

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::CacheVolume;

/// PATH used when neither the state nor the base image report one
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Container path the working directory is mounted at
pub const WORKDIR_MOUNT: &str = "/src";

/// Opaque secret value captured from the host environment.
///
/// `Debug` redacts the value and there is no `Display`. Only build clients
/// read the plaintext, at the moment they inject it into a container.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    name: String,
    value: String,
}

impl Secret {
    /// Wrap a value under the given name
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Name the secret was captured under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("value", &"***")
            .finish()
    }
}

/// A cache volume mounted into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMount {
    /// Volume name in the client's namespace
    pub volume: String,
    /// Mount path inside the container
    pub path: String,
}

impl CacheMount {
    /// Volume mount argument (`volume:path`)
    pub fn volume_arg(&self) -> String {
        format!("{}:{}", self.volume, self.path)
    }
}

/// Immutable, versioned container specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    image: String,
    revision: u64,
    env: BTreeMap<String, String>,
    secrets: BTreeMap<String, Secret>,
    caches: BTreeMap<String, CacheMount>,
    directories: BTreeMap<String, PathBuf>,
    workdir: Option<String>,
    steps: Vec<Vec<String>>,
}

impl ContainerState {
    /// Start a specification from a base image reference
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            revision: 0,
            env: BTreeMap::new(),
            secrets: BTreeMap::new(),
            caches: BTreeMap::new(),
            directories: BTreeMap::new(),
            workdir: None,
            steps: Vec::new(),
        }
    }

    fn next(mut self) -> Self {
        self.revision += 1;
        self
    }

    /// Set an environment variable, replacing any previous value or secret
    pub fn with_env_variable(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.next();
        let name = name.into();
        next.secrets.remove(&name);
        next.env.insert(name, value.into());
        next
    }

    /// Expose a secret as an environment variable, replacing any plain value
    pub fn with_secret_variable(self, name: impl Into<String>, secret: Secret) -> Self {
        let mut next = self.next();
        let name = name.into();
        next.env.remove(&name);
        next.secrets.insert(name, secret);
        next
    }

    /// Mount a cache volume. A second mount at the same path replaces the first.
    pub fn with_mounted_cache(self, path: impl Into<String>, volume: &CacheVolume) -> Self {
        let mut next = self.next();
        let path = path.into();
        next.caches.insert(
            path.clone(),
            CacheMount {
                volume: volume.name.clone(),
                path,
            },
        );
        next
    }

    /// Bind-mount a host directory
    pub fn with_mounted_directory(self, path: impl Into<String>, host: impl AsRef<Path>) -> Self {
        let mut next = self.next();
        next.directories
            .insert(path.into(), host.as_ref().to_path_buf());
        next
    }

    /// Set the working directory for exec steps
    pub fn with_workdir(self, path: impl Into<String>) -> Self {
        let mut next = self.next();
        next.workdir = Some(path.into());
        next
    }

    /// Append an exec step. Steps run in order when the container is executed.
    pub fn with_exec<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.next();
        next.steps.push(args.into_iter().map(Into::into).collect());
        next
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Number of transformations applied since `from_image`
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn env_variable(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn secrets(&self) -> &BTreeMap<String, Secret> {
        &self.secrets
    }

    pub fn caches(&self) -> impl Iterator<Item = &CacheMount> {
        self.caches.values()
    }

    pub fn cache_at(&self, path: &str) -> Option<&CacheMount> {
        self.caches.get(path)
    }

    pub fn directories(&self) -> &BTreeMap<String, PathBuf> {
        &self.directories
    }

    pub fn workdir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }

    pub fn steps(&self) -> &[Vec<String>] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(name: &str) -> CacheVolume {
        CacheVolume::named(name)
    }

    #[test]
    fn transformations_bump_revision() {
        let base = ContainerState::from_image("alpine:3.20");
        assert_eq!(base.revision(), 0);

        let next = base.clone().with_env_variable("A", "1").with_exec(["true"]);
        assert_eq!(next.revision(), 2);
        assert_eq!(base.revision(), 0);
        assert!(base.env().is_empty());
    }

    #[test]
    fn env_later_value_wins() {
        let state = ContainerState::from_image("alpine")
            .with_env_variable("A", "1")
            .with_env_variable("A", "2");
        assert_eq!(state.env_variable("A"), Some("2"));
    }

    #[test]
    fn cache_mount_replaces_same_path() {
        let state = ContainerState::from_image("alpine")
            .with_mounted_cache("/cache", &volume("first"))
            .with_mounted_cache("/cache", &volume("second"));

        let mounts: Vec<_> = state.caches().collect();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].volume, "second");
        assert_eq!(mounts[0].volume_arg(), "second:/cache");
    }

    #[test]
    fn secret_and_plain_env_are_exclusive() {
        let secret = Secret::new("TOKEN", "s3cr3t");
        let state = ContainerState::from_image("alpine")
            .with_env_variable("TOKEN", "plain")
            .with_secret_variable("TOKEN", secret.clone());
        assert_eq!(state.env_variable("TOKEN"), None);
        assert_eq!(state.secrets().get("TOKEN"), Some(&secret));

        let state = state.with_env_variable("TOKEN", "plain");
        assert!(state.secrets().is_empty());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("GITHUB_TOKEN", "ghp_verysecret");
        let rendered = format!("{:?}", secret);
        assert!(rendered.contains("GITHUB_TOKEN"));
        assert!(!rendered.contains("ghp_verysecret"));
    }

    #[test]
    fn exec_steps_keep_order() {
        let state = ContainerState::from_image("alpine")
            .with_exec(["echo", "one"])
            .with_exec(["echo", "two"]);
        assert_eq!(state.steps()[0], vec!["echo", "one"]);
        assert_eq!(state.steps()[1], vec!["echo", "two"]);
    }
}
