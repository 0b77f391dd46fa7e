//! Run pre-commit hooks against the working directory

use crate::config::{ConfigOption, PrecommitConfig};
use crate::customize::{
    customized_container_from_image, BoxedCustomizer, Customizer, DownloadFile, EnvVariables,
    MountedCache,
};
use crate::error::StepResult;
use crate::runtime::RuntimeContext;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = ".pre-commit-config.yaml";
pub const CACHE_DIR: &str = "/pre-commit-cache";
pub const CACHE_PREFIX: &str = "pre-commit-";
pub const HOME_ENV_VAR: &str = "PRE_COMMIT_HOME";

pub fn base_image(image: impl Into<String>) -> ConfigOption<PrecommitConfig> {
    let image = image.into();
    Box::new(move |mut c| {
        c.base_image = image;
        c
    })
}

pub fn precommit_version(version: impl Into<String>) -> ConfigOption<PrecommitConfig> {
    let version = version.into();
    Box::new(move |mut c| {
        c.version = version;
        c
    })
}

pub fn env_variable(name: impl Into<String>, value: impl Into<String>) -> ConfigOption<PrecommitConfig> {
    let (name, value) = (name.into(), value.into());
    Box::new(move |mut c| {
        c.env.insert(name, value);
        c
    })
}

fn release_url(version: &str) -> String {
    format!(
        "https://github.com/pre-commit/pre-commit/releases/download/v{v}/pre-commit-{v}.pyz",
        v = version
    )
}

fn zipapp_path(version: &str) -> String {
    format!("/usr/local/bin/pre-commit-{}.pyz", version)
}

/// Customizers for a pre-commit run, in application order: env, caller
/// extras, the zipapp download and the hook cache.
pub async fn customizers(
    ctx: &RuntimeContext,
    config: &PrecommitConfig,
    extra: Vec<BoxedCustomizer>,
) -> StepResult<Vec<BoxedCustomizer>> {
    let cache = ctx
        .resolve_cache_volume(CACHE_PREFIX, &[CONFIG_FILE_NAME])
        .await?;

    let mut customizers = vec![EnvVariables::new(config.env.clone()).boxed()];
    customizers.extend(extra);
    customizers.push(DownloadFile::new(release_url(&config.version), zipapp_path(&config.version)).boxed());
    customizers.push(MountedCache::new(cache, CACHE_DIR).with_env_var(HOME_ENV_VAR).boxed());

    Ok(customizers)
}

/// Run every hook on all files, showing the diff on failure
pub async fn run(
    ctx: &RuntimeContext,
    config: &PrecommitConfig,
    extra: Vec<BoxedCustomizer>,
) -> StepResult<String> {
    let customizers = customizers(ctx, config, extra).await?;
    let zipapp = zipapp_path(&config.version);

    info!(image = %config.base_image, version = %config.version, "Running pre-commit");

    let state = customized_container_from_image(ctx, &config.base_image, true, &customizers)
        .await?
        .with_exec([
            "python",
            zipapp.as_str(),
            "run",
            "--all-files",
            "--show-diff-on-failure",
        ]);

    ctx.stdout(&state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::apply_options;
    use crate::container::WORKDIR_MOUNT;
    use crate::error::StepError;
    use crate::runtime::fake::RecordingClient;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn workdir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "repos: []\n").unwrap();
        dir
    }

    #[test]
    fn options_override_defaults() {
        let config = apply_options(
            PrecommitConfig::default(),
            [base_image("python:3.11"), env_variable("SKIP", "lint")],
        );
        assert_eq!(config.base_image, "python:3.11");
        assert_eq!(config.version, "2.20.0");
        assert_eq!(config.env["SKIP"], "lint");
    }

    #[tokio::test]
    async fn run_builds_expected_container() {
        let dir = workdir();
        let client = Arc::new(RecordingClient::new().with_stdout("All hooks passed\n"));
        let ctx = RuntimeContext::builder(client.clone(), dir.path()).build();

        let config = apply_options(PrecommitConfig::default(), [env_variable("SKIP", "lint")]);
        let out = run(&ctx, &config, Vec::new()).await.unwrap();
        assert_eq!(out, "All hooks passed\n");

        let executed = client.executed();
        assert_eq!(executed.len(), 1);
        let state = &executed[0];

        assert_eq!(state.image(), "python:3.12.0a1-bullseye");
        assert_eq!(state.workdir(), Some(WORKDIR_MOUNT));
        assert_eq!(state.env_variable("SKIP"), Some("lint"));
        assert_eq!(state.env_variable(HOME_ENV_VAR), Some(CACHE_DIR));
        assert!(state.cache_at(CACHE_DIR).unwrap().volume.starts_with(CACHE_PREFIX));

        let steps = state.steps();
        assert_eq!(
            steps[0].last().map(String::as_str),
            Some("https://github.com/pre-commit/pre-commit/releases/download/v2.20.0/pre-commit-2.20.0.pyz")
        );
        assert_eq!(
            steps[1],
            [
                "python",
                "/usr/local/bin/pre-commit-2.20.0.pyz",
                "run",
                "--all-files",
                "--show-diff-on-failure"
            ]
        );
    }

    #[tokio::test]
    async fn extra_customizers_run_after_env() {
        let dir = workdir();
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), dir.path()).build();

        let config = apply_options(PrecommitConfig::default(), [env_variable("MODE", "base")]);
        let extra = vec![EnvVariables::new([("MODE", "override")]).boxed()];

        let customizers = customizers(&ctx, &config, extra).await.unwrap();
        assert_eq!(customizers.len(), 4);

        let state = customized_container_from_image(&ctx, "python", true, &customizers)
            .await
            .unwrap();
        assert_eq!(state.env_variable("MODE"), Some("override"));
    }

    #[tokio::test]
    async fn missing_config_file() {
        let dir = TempDir::new().unwrap();
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), dir.path()).build();

        let err = run(&ctx, &PrecommitConfig::default(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::MissingInputs { .. }));
    }
}
