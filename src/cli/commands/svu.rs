//! Svu command - print the next version

use super::Invocation;
use crate::catalog::svu;
use crate::cli::args::SvuArgs;
use crate::config::{apply_options, Config, ConfigOption, SvuConfig};
use crate::error::StepResult;
use crate::runtime::{BuildClient, PodmanClient};
use std::sync::Arc;
use tracing::debug;

/// Execute the svu command
pub async fn execute(args: SvuArgs, config: &Config, inv: &Invocation) -> StepResult<()> {
    let version = run_with(args, config, inv, Arc::new(PodmanClient::new())).await?;
    println!("{}", version);
    Ok(())
}

/// Run svu through `client` and return the version it printed
pub async fn run_with(
    args: SvuArgs,
    config: &Config,
    inv: &Invocation,
    client: Arc<dyn BuildClient>,
) -> StepResult<String> {
    let ctx = inv.runtime(client).build();
    let settings = apply_options(config.svu.clone(), options(args));
    debug!(?settings, "Resolved svu settings");
    svu::run(&ctx, &settings).await
}

fn options(args: SvuArgs) -> Vec<ConfigOption<SvuConfig>> {
    let mut options = Vec::new();

    if let Some(version) = args.svu_version {
        options.push(svu::svu_version(version));
    }
    if let Some(enabled) = args.metadata {
        options.push(svu::with_metadata(enabled));
    }
    if let Some(enabled) = args.prerelease {
        options.push(svu::with_prerelease(enabled));
    }
    if let Some(enabled) = args.build {
        options.push(svu::with_build(enabled));
    }
    if let Some(command) = args.svu_command {
        options.push(svu::with_command(command));
    }
    if let Some(pattern) = args.pattern {
        options.push(svu::with_pattern(pattern));
    }
    if let Some(prefix) = args.prefix {
        options.push(svu::with_prefix(prefix));
    }
    if let Some(suffix) = args.suffix {
        options.push(svu::with_suffix(suffix));
    }
    if let Some(mode) = args.tag_mode {
        options.push(svu::with_tag_mode(mode));
    }

    options
}
