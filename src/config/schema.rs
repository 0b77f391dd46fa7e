//! Configuration schema for stepwright
//!
//! Configuration is read from `stepwright.toml` in the working directory

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// pre-commit step settings
    pub precommit: PrecommitConfig,

    /// svu step settings
    pub svu: SvuConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// pre-commit step configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecommitConfig {
    /// Base image providing python
    pub base_image: String,

    /// pre-commit release to download
    pub version: String,

    /// Extra environment variables for the hook run
    pub env: BTreeMap<String, String>,
}

impl Default for PrecommitConfig {
    fn default() -> Self {
        Self {
            base_image: "python:3.12.0a1-bullseye".to_string(),
            version: "2.20.0".to_string(),
            env: BTreeMap::new(),
        }
    }
}

/// svu subcommand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SvuCommand {
    #[default]
    Next,
    Major,
    Minor,
    Patch,
    Current,
}

impl SvuCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Current => "current",
        }
    }
}

impl fmt::Display for SvuCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tags svu considers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TagMode {
    #[default]
    AllBranches,
    CurrentBranch,
}

impl TagMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllBranches => "all-branches",
            Self::CurrentBranch => "current-branch",
        }
    }
}

impl fmt::Display for TagMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// svu step configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvuConfig {
    /// svu image tag
    pub version: String,

    /// Keep build metadata from the current tag
    pub metadata: bool,

    /// Keep pre-release from the current tag
    pub prerelease: bool,

    /// Keep build info from the current tag
    pub build: bool,

    pub command: SvuCommand,

    /// Tag glob; empty leaves svu's default
    pub pattern: String,

    /// Tag prefix; empty leaves svu's default
    pub prefix: String,

    /// Version suffix; empty leaves svu's default
    pub suffix: String,

    pub tag_mode: TagMode,
}

impl Default for SvuConfig {
    fn default() -> Self {
        Self {
            version: "v1.9.0".to_string(),
            metadata: true,
            prerelease: true,
            build: true,
            command: SvuCommand::Next,
            pattern: String::new(),
            prefix: String::new(),
            suffix: String::new(),
            tag_mode: TagMode::AllBranches,
        }
    }
}
