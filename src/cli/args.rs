//! CLI argument definitions using clap derive

use crate::config::{SvuCommand, TagMode};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stepwright - containerized CI steps with content-addressed caches
///
/// Runs catalog steps (pre-commit, svu) in rootless Podman containers,
/// keyed cache volumes included.
#[derive(Parser, Debug)]
#[command(name = "stepwright")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path (default: ./stepwright.toml when present)
    #[arg(short, long, global = true, env = "STEPWRIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Working directory mounted into step containers (default: current directory)
    #[arg(short = 'C', long, global = true)]
    pub workdir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all pre-commit hooks on all files
    Precommit(PrecommitArgs),

    /// Print the next semantic version from git tags
    Svu(SvuArgs),

    /// Inspect content-addressed cache volumes
    Cache(CacheArgs),
}

/// Arguments for the precommit command
#[derive(Parser, Debug, Default)]
pub struct PrecommitArgs {
    /// Base image providing python
    #[arg(long)]
    pub base_image: Option<String>,

    /// pre-commit release to use
    #[arg(long)]
    pub precommit_version: Option<String>,

    /// Environment variables for the hook run (KEY=VALUE)
    #[arg(short, long = "env", value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Install a Go toolchain first (e.g. 1.19.3)
    #[arg(long)]
    pub go_version: Option<String>,

    /// Mount Go build/module caches keyed by go.mod and go.sum under this path
    #[arg(long, value_name = "PATH")]
    pub go_cache: Option<String>,
}

/// Arguments for the svu command
#[derive(Parser, Debug, Default)]
pub struct SvuArgs {
    /// svu image tag
    #[arg(long, env = "SVU_VERSION")]
    pub svu_version: Option<String>,

    /// Keep build metadata from the current tag
    #[arg(long, env = "SVU_METADATA")]
    pub metadata: Option<bool>,

    /// Keep pre-release from the current tag
    #[arg(long, env = "SVU_PRERELEASE")]
    pub prerelease: Option<bool>,

    /// Keep build info from the current tag
    #[arg(long, env = "SVU_BUILD")]
    pub build: Option<bool>,

    /// svu subcommand
    #[arg(long = "command", env = "SVU_COMMAND")]
    pub svu_command: Option<SvuCommand>,

    /// Tag glob
    #[arg(long, env = "SVU_PATTERN")]
    pub pattern: Option<String>,

    /// Tag prefix
    #[arg(long, env = "SVU_PREFIX")]
    pub prefix: Option<String>,

    /// Version suffix
    #[arg(long, env = "SVU_SUFFIX")]
    pub suffix: Option<String>,

    /// Which branches' tags to consider
    #[arg(long, env = "SVU_TAG_MODE")]
    pub tag_mode: Option<TagMode>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache key for files under the working directory
    Key {
        /// Key prefix (e.g. go-mod-)
        #[arg(short, long)]
        prefix: String,

        /// Tracked files, relative to the working directory
        #[arg(required = true)]
        files: Vec<String>,

        /// Fail if any listed file is missing
        #[arg(long)]
        require_all: bool,
    },

    /// List cache volumes created by stepwright
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Plain,
}

/// Parse environment variable in KEY=VALUE format
fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
