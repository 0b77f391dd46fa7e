//! Precommit command - run pre-commit hooks in a container

use super::Invocation;
use crate::catalog::precommit;
use crate::cli::args::PrecommitArgs;
use crate::config::{apply_options, Config, ConfigOption, PrecommitConfig};
use crate::customize::{BoxedCustomizer, Customizer, InstallToolchain, MountedGoCache};
use crate::error::StepResult;
use crate::runtime::{BuildClient, PodmanClient};
use crate::ui::TaskSpinner;
use std::sync::Arc;

/// Execute the precommit command
pub async fn execute(args: PrecommitArgs, config: &Config, inv: &Invocation) -> StepResult<()> {
    let mut spinner = TaskSpinner::new(&inv.ui);
    spinner.start("Running pre-commit hooks...");

    match run_with(args, config, inv, Arc::new(PodmanClient::new())).await {
        Ok(output) => {
            spinner.stop("pre-commit hooks passed");
            print!("{}", output);
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("pre-commit hooks failed");
            Err(e)
        }
    }
}

/// Run pre-commit through `client` and return its output
pub async fn run_with(
    args: PrecommitArgs,
    config: &Config,
    inv: &Invocation,
    client: Arc<dyn BuildClient>,
) -> StepResult<String> {
    let ctx = inv.runtime(client).build();

    let mut extra: Vec<BoxedCustomizer> = Vec::new();
    if let Some(version) = &args.go_version {
        extra.push(InstallToolchain::go(version).boxed());
    }
    if let Some(path) = &args.go_cache {
        extra.push(MountedGoCache::new(path.as_str()).boxed());
    }

    let settings = apply_options(config.precommit.clone(), options(args));
    precommit::run(&ctx, &settings, extra).await
}

fn options(args: PrecommitArgs) -> Vec<ConfigOption<PrecommitConfig>> {
    let mut options = Vec::new();

    if let Some(image) = args.base_image {
        options.push(precommit::base_image(image));
    }
    if let Some(version) = args.precommit_version {
        options.push(precommit::precommit_version(version));
    }
    for (name, value) in args.env {
        options.push(precommit::env_variable(name, value));
    }

    options
}
