//! Compute the next semantic version from git tags with svu

use crate::config::{ConfigOption, SvuCommand, SvuConfig, TagMode};
use crate::customize::customized_container_from_image;
use crate::error::StepResult;
use crate::runtime::RuntimeContext;
use tracing::info;

pub const IMAGE_REPOSITORY: &str = "ghcr.io/caarlos0/svu";

pub fn svu_version(version: impl Into<String>) -> ConfigOption<SvuConfig> {
    let version = version.into();
    Box::new(move |mut c| {
        c.version = version;
        c
    })
}

pub fn with_metadata(enabled: bool) -> ConfigOption<SvuConfig> {
    Box::new(move |mut c| {
        c.metadata = enabled;
        c
    })
}

pub fn with_prerelease(enabled: bool) -> ConfigOption<SvuConfig> {
    Box::new(move |mut c| {
        c.prerelease = enabled;
        c
    })
}

pub fn with_build(enabled: bool) -> ConfigOption<SvuConfig> {
    Box::new(move |mut c| {
        c.build = enabled;
        c
    })
}

pub fn with_command(command: SvuCommand) -> ConfigOption<SvuConfig> {
    Box::new(move |mut c| {
        c.command = command;
        c
    })
}

pub fn with_pattern(pattern: impl Into<String>) -> ConfigOption<SvuConfig> {
    let pattern = pattern.into();
    Box::new(move |mut c| {
        c.pattern = pattern;
        c
    })
}

pub fn with_prefix(prefix: impl Into<String>) -> ConfigOption<SvuConfig> {
    let prefix = prefix.into();
    Box::new(move |mut c| {
        c.prefix = prefix;
        c
    })
}

pub fn with_suffix(suffix: impl Into<String>) -> ConfigOption<SvuConfig> {
    let suffix = suffix.into();
    Box::new(move |mut c| {
        c.suffix = suffix;
        c
    })
}

pub fn with_tag_mode(mode: TagMode) -> ConfigOption<SvuConfig> {
    Box::new(move |mut c| {
        c.tag_mode = mode;
        c
    })
}

fn toggle(enabled: bool, name: &str) -> String {
    if enabled {
        format!("--{}", name)
    } else {
        format!("--no-{}", name)
    }
}

/// svu command line for `config`. Empty pattern, prefix and suffix are
/// left to svu's own defaults.
pub fn args(config: &SvuConfig) -> Vec<String> {
    let mut args = vec![
        "svu".to_string(),
        config.command.to_string(),
        toggle(config.metadata, "metadata"),
        toggle(config.prerelease, "pre-release"),
        toggle(config.build, "build"),
        "--tag-mode".to_string(),
        config.tag_mode.to_string(),
    ];

    for (flag, value) in [
        ("--pattern", &config.pattern),
        ("--prefix", &config.prefix),
        ("--suffix", &config.suffix),
    ] {
        if !value.is_empty() {
            args.push(flag.to_string());
            args.push(value.clone());
        }
    }

    args
}

pub fn image(config: &SvuConfig) -> String {
    format!("{}:{}", IMAGE_REPOSITORY, config.version)
}

/// Run svu against the working directory's git history and return the version
pub async fn run(ctx: &RuntimeContext, config: &SvuConfig) -> StepResult<String> {
    let image = image(config);
    info!(image = %image, command = %config.command, "Running svu");

    let state = customized_container_from_image(ctx, &image, true, &[])
        .await?
        .with_exec(args(config));

    let stdout = ctx.stdout(&state).await?;
    Ok(stdout.trim().to_string())
}
