//! Integration tests for stepwright

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn stepwright() -> Command {
        let mut cmd = cargo_bin_cmd!("stepwright");
        cmd.env_remove("STEPWRIGHT_CONFIG");
        cmd
    }

    #[test]
    fn help_displays() {
        stepwright()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("containerized CI steps"));
    }

    #[test]
    fn version_displays() {
        stepwright()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stepwright"));
    }

    #[test]
    fn cache_key_prints_volume_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module x").unwrap();
        fs::write(dir.path().join("go.sum"), "").unwrap();

        stepwright()
            .arg("-C")
            .arg(dir.path())
            .args(["cache", "key", "--prefix", "go-build-", "go.mod", "go.sum"])
            .assert()
            .success()
            .stdout(predicate::str::is_match("^go-build-[0-9a-f]{64}\n$").unwrap());
    }

    #[test]
    fn cache_key_is_stable_across_runs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".pre-commit-config.yaml"), "repos: []").unwrap();

        let run = || {
            let output = stepwright()
                .arg("-C")
                .arg(dir.path())
                .args(["cache", "key", "-p", "pre-commit-", ".pre-commit-config.yaml"])
                .output()
                .unwrap();
            assert!(output.status.success());
            String::from_utf8(output.stdout).unwrap()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn cache_key_missing_inputs_fails() {
        let dir = TempDir::new().unwrap();

        stepwright()
            .arg("-C")
            .arg(dir.path())
            .args(["cache", "key", "--prefix", "go-mod-", "go.mod"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("go.mod"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn cache_key_rejects_parent_paths() {
        let dir = TempDir::new().unwrap();

        stepwright()
            .arg("-C")
            .arg(dir.path())
            .args(["cache", "key", "--prefix", "x-", "../go.mod"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid path"));
    }

    #[test]
    fn invalid_config_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stepwright.toml"), "[svu\n").unwrap();

        stepwright()
            .arg("-C")
            .arg(dir.path())
            .args(["cache", "key", "--prefix", "x-", "a"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn svu_rejects_unknown_command() {
        stepwright()
            .args(["svu", "--command", "sideways"])
            .assert()
            .failure();
    }
}

mod pipeline_tests {
    use std::fs;
    use std::sync::Arc;
    use stepwright::cache::{hash_file_set, FileSet};
    use stepwright::customize::{
        apply_customizations, customized_container_from_image, Customizer, DownloadFile,
        EnvVariables, MountedCache,
    };
    use stepwright::runtime::fake::RecordingClient;
    use stepwright::runtime::{cancel_pair, CancelSignal, RuntimeContext};
    use stepwright::container::ContainerState;
    use stepwright::StepError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn go_cache_identity_follows_file_contents() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module x").unwrap();
        fs::write(dir.path().join("go.sum"), "").unwrap();

        let client = Arc::new(RecordingClient::new());
        let ctx = RuntimeContext::builder(client.clone(), dir.path()).build();
        let files = ["go.mod", "go.sum"];

        let first = ctx.resolve_cache_volume("go-build-", &files).await.unwrap();
        let second = ctx.resolve_cache_volume("go-build-", &files).await.unwrap();
        assert_eq!(first.name, second.name);
        assert_eq!(client.created_volume_count(), 1);

        fs::write(dir.path().join("go.mod"), "module y").unwrap();
        let third = ctx.resolve_cache_volume("go-build-", &files).await.unwrap();
        assert_ne!(first.name, third.name);
        assert_eq!(client.created_volume_count(), 2);

        // Every resolution asks the client
        assert_eq!(client.volume_requests().len(), 3);
    }

    #[tokio::test]
    async fn partially_present_files_still_key() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.sum"), "h1:abc").unwrap();

        let set = FileSet::new(dir.path(), ["go.mod", "go.sum"]).unwrap();
        let digest = hash_file_set(&set, &CancelSignal::never()).await.unwrap();

        let missing: Vec<_> = digest.missing().collect();
        assert_eq!(missing, [std::path::Path::new("go.mod")]);
    }

    #[tokio::test]
    async fn later_env_values_win() {
        let ctx = RuntimeContext::builder(Arc::new(RecordingClient::new()), "/work").build();
        let pipeline = vec![
            EnvVariables::new([("A", "1")]).boxed(),
            EnvVariables::new([("A", "2")]).boxed(),
        ];

        let state = apply_customizations(&ctx, ContainerState::from_image("alpine"), &pipeline)
            .await
            .unwrap();
        assert_eq!(state.env_variable("A"), Some("2"));
    }

    #[tokio::test]
    async fn unreachable_download_fails_at_execution() {
        let client = Arc::new(RecordingClient::new().with_unreachable_host("unreachable.invalid"));
        let ctx = RuntimeContext::builder(client.clone(), "/work").build();

        let pipeline = vec![
            DownloadFile::new("https://unreachable.invalid/tool.tar.gz", "/tmp/tool.tar.gz").boxed(),
        ];

        // Composition only records the download
        let state = customized_container_from_image(&ctx, "alpine", true, &pipeline)
            .await
            .unwrap();
        assert!(client.executed().is_empty());

        let err = ctx.stdout(&state).await.unwrap_err();
        match err {
            StepError::Execution { code, output } => {
                assert_eq!(code, Some(6));
                assert!(output.contains("Could not resolve host"));
            }
            other => panic!("expected execution error, got {other}"),
        }
    }

    #[tokio::test]
    async fn failing_volume_store_names_the_step() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "module x").unwrap();
        fs::write(dir.path().join("go.sum"), "").unwrap();

        let client = Arc::new(RecordingClient::new().with_failing_volumes());
        let ctx = RuntimeContext::builder(client, dir.path()).build();

        let pipeline = vec![
            EnvVariables::new([("CGO_ENABLED", "0")]).boxed(),
            stepwright::customize::MountedGoCache::new(".").boxed(),
        ];

        let err = apply_customizations(&ctx, ContainerState::from_image("golang"), &pipeline)
            .await
            .unwrap_err();
        match err {
            StepError::Customization { index, source, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, StepError::VolumeResolution { .. }));
            }
            other => panic!("expected customization error, got {other}"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let (handle, signal) = cancel_pair();
        let client = Arc::new(RecordingClient::new());
        let ctx = RuntimeContext::builder(client.clone(), "/work")
            .cancel_signal(signal)
            .build();
        handle.cancel();

        let volume = stepwright::cache::CacheVolume::named("v");
        let pipeline = vec![MountedCache::new(volume, "/cache").boxed()];

        let err = apply_customizations(&ctx, ContainerState::from_image("alpine"), &pipeline)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Cancelled));

        let state = ContainerState::from_image("alpine").with_exec(["true"]);
        assert!(ctx.stdout(&state).await.unwrap_err().is_cancelled());
        assert!(client.executed().is_empty());
    }
}
