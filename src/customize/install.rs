//! Tool installation customizers

use crate::container::ContainerState;
use crate::customize::download::CURL_FLAGS;
use crate::customize::{AppendToPath, Customizer, DownloadFile};
use crate::error::StepResult;
use crate::runtime::RuntimeContext;
use async_trait::async_trait;

pub const DEFAULT_GO_VERSION: &str = "1.19.3";
pub const DEFAULT_GH_VERSION: &str = "2.20.2";

/// Install a tarball toolchain under a root directory and put its bin dir on PATH
#[derive(Debug, Clone)]
pub struct InstallToolchain {
    name: String,
    version: String,
    url: String,
    install_root: String,
    bin_dir: String,
}

impl InstallToolchain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
        install_root: impl Into<String>,
        bin_dir: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            url: url.into(),
            install_root: install_root.into(),
            bin_dir: bin_dir.into(),
        }
    }

    /// Go from go.dev, installed into `/usr/local/go`.
    /// An empty version selects the default.
    pub fn go(version: &str) -> Self {
        let version = non_empty_or(version, DEFAULT_GO_VERSION);
        Self::new(
            "go",
            version,
            format!("https://go.dev/dl/go{}.linux-amd64.tar.gz", version),
            "/usr/local",
            "/usr/local/go/bin",
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn script(&self) -> String {
        format!(
            "curl {} {} | tar -C {} -xz",
            shell_words::join(CURL_FLAGS),
            shell_words::quote(&self.url),
            shell_words::quote(&self.install_root),
        )
    }
}

#[async_trait]
impl Customizer for InstallToolchain {
    fn name(&self) -> String {
        format!("install-toolchain({} {})", self.name, self.version)
    }

    async fn apply(&self, ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        let state = state.with_exec(["sh", "-ec", self.script().as_str()]);
        AppendToPath::new(self.bin_dir.as_str()).apply(ctx, state).await
    }
}

/// Download a release archive, unpack one binary into place, and
/// optionally install extensions with it
#[derive(Debug, Clone)]
pub struct InstallCliTool {
    name: String,
    version: String,
    url: String,
    archive: String,
    extract_dir: String,
    source_binary: String,
    target_binary: String,
    cleanup: Vec<String>,
    secret: Option<String>,
    extension_command: Vec<String>,
    extensions: Vec<String>,
}

impl InstallCliTool {
    /// The GitHub CLI. `GITHUB_TOKEN` is injected as a secret so
    /// extension installs are authenticated.
    pub fn github<I, S>(version: &str, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let version = non_empty_or(version, DEFAULT_GH_VERSION);
        let archive = "/tmp/gh_linux_amd64.tar.gz".to_string();
        let extracted = format!("/tmp/gh_{}_linux_amd64", version);

        Self {
            name: "gh".to_string(),
            version: version.to_string(),
            url: format!(
                "https://github.com/cli/cli/releases/download/v{v}/gh_{v}_linux_amd64.tar.gz",
                v = version
            ),
            source_binary: format!("{}/bin/gh", extracted),
            target_binary: "/usr/local/bin/gh".to_string(),
            cleanup: vec![archive.clone(), extracted],
            archive,
            extract_dir: "/tmp".to_string(),
            secret: Some("GITHUB_TOKEN".to_string()),
            extension_command: vec!["gh".into(), "extension".into(), "install".into()],
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

#[async_trait]
impl Customizer for InstallCliTool {
    fn name(&self) -> String {
        format!("install-cli-tool({} {})", self.name, self.version)
    }

    async fn apply(&self, ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        // Fail on a missing secret before anything is recorded.
        let secret = match &self.secret {
            Some(name) => Some((name.as_str(), ctx.secret(name)?)),
            None => None,
        };

        let mut state = DownloadFile::new(self.url.as_str(), self.archive.as_str())
            .apply(ctx, state)
            .await?;

        if let Some((name, secret)) = secret {
            state = state.with_secret_variable(name, secret);
        }

        let mut cleanup = vec!["rm".to_string(), "-rf".to_string()];
        cleanup.extend(self.cleanup.iter().cloned());

        state = state
            .with_exec(["tar", "-xf", self.archive.as_str(), "-C", self.extract_dir.as_str()])
            .with_exec(["mv", self.source_binary.as_str(), self.target_binary.as_str()])
            .with_exec(cleanup);

        for extension in &self.extensions {
            let mut args = self.extension_command.clone();
            args.push(extension.clone());
            state = state.with_exec(args);
        }

        Ok(state)
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
