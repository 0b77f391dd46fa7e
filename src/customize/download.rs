//! Download customizers
//!
//! These only record an exec step. A failed fetch surfaces when the
//! container runs, never while the pipeline is being composed.

use crate::container::ContainerState;
use crate::customize::Customizer;
use crate::error::StepResult;
use crate::runtime::RuntimeContext;
use async_trait::async_trait;

/// curl flags that fail on HTTP errors and refuse non-https redirects
pub(crate) const CURL_FLAGS: [&str; 9] = [
    "--location",
    "--fail",
    "--silent",
    "--show-error",
    "--proto",
    "=http,https",
    "--proto-redir",
    "=https",
    "--",
];

pub(crate) fn curl_args(url: &str, dest: &str) -> Vec<String> {
    let (flags, end_of_options) = CURL_FLAGS.split_at(CURL_FLAGS.len() - 1);
    std::iter::once("curl")
        .chain(flags.iter().copied())
        .chain(["--output", dest])
        .chain(end_of_options.iter().copied())
        .chain(std::iter::once(url))
        .map(str::to_string)
        .collect()
}

/// Download a URL to a file inside the container
#[derive(Debug, Clone)]
pub struct DownloadFile {
    url: String,
    dest: String,
}

impl DownloadFile {
    pub fn new(url: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
        }
    }
}

#[async_trait]
impl Customizer for DownloadFile {
    fn name(&self) -> String {
        format!("download-file({})", self.url)
    }

    async fn apply(&self, _ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        Ok(state.with_exec(curl_args(&self.url, &self.dest)))
    }
}

/// Download a URL and mark the destination executable
#[derive(Debug, Clone)]
pub struct DownloadExecutableFile {
    download: DownloadFile,
}

impl DownloadExecutableFile {
    pub fn new(url: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            download: DownloadFile::new(url, dest),
        }
    }
}

#[async_trait]
impl Customizer for DownloadExecutableFile {
    fn name(&self) -> String {
        format!("download-executable-file({})", self.download.url)
    }

    async fn apply(&self, ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        let state = self.download.apply(ctx, state).await?;
        Ok(state.with_exec(["chmod", "755", self.download.dest.as_str()]))
    }
}
