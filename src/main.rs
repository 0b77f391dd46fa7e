//! Stepwright - containerized CI steps
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use stepwright::cli::commands::{self, Invocation};
use stepwright::cli::{Cli, Commands};
use stepwright::config::{Config, ConfigManager};
use stepwright::error::{StepError, StepResult};
use stepwright::runtime::cancel_pair;
use stepwright::ui::UiContext;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("stepwright=warn"),
        1 => EnvFilter::new("stepwright=info"),
        _ => EnvFilter::new("stepwright=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

async fn run() -> StepResult<()> {
    let cli = Cli::parse();

    let workdir = match cli.workdir {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| StepError::io("getting current directory", e))?,
    };
    // Podman bind mounts need an absolute host path
    let workdir = tokio::fs::canonicalize(&workdir).await.map_err(|e| {
        StepError::io(format!("resolving working directory {}", workdir.display()), e)
    })?;

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::find_local_config(&workdir),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling step");
            cancel.cancel();
        }
    });

    let inv = Invocation {
        workdir,
        cancel: signal,
        ui: UiContext::detect(),
    };

    match cli.command {
        Commands::Precommit(args) => commands::precommit(args, &config, &inv).await,
        Commands::Svu(args) => commands::svu(args, &config, &inv).await,
        Commands::Cache(args) => commands::cache(args, &inv).await,
    }
}
