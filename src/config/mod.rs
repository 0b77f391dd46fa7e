//! Configuration management for stepwright
//!
//! Settings are layered: built-in defaults, then `stepwright.toml`, then
//! functional options (usually derived from CLI flags).

pub mod schema;

pub use schema::{Config, GeneralConfig, PrecommitConfig, SvuCommand, SvuConfig, TagMode};

use crate::error::{StepError, StepResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "stepwright.toml";

/// A deferred change to a config value, applied after the file is loaded
pub type ConfigOption<T> = Box<dyn FnOnce(T) -> T + Send>;

/// Apply options in order; later options win
pub fn apply_options<T>(base: T, options: impl IntoIterator<Item = ConfigOption<T>>) -> T {
    options.into_iter().fold(base, |config, option| option(config))
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Use an explicit config file, which must exist
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// Use `stepwright.toml` in `workdir` if present
    pub fn find_local_config(workdir: &Path) -> Self {
        Self {
            config_path: workdir.join(CONFIG_FILE_NAME),
            explicit: false,
        }
    }

    /// Load configuration, falling back to defaults when no local file exists
    pub async fn load(&self) -> StepResult<Config> {
        if !self.explicit && !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> StepResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StepError::io(format!("reading config from {}", path.display()), e))?;

        debug!("Loaded config from {}", path.display());

        toml::from_str(&content).map_err(|e| StepError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
