//! Error types for stepwright
//!
//! All modules use `StepResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stepwright operations
pub type StepResult<T> = Result<T, StepError>;

/// All errors that can occur while preparing or running a pipeline step
#[derive(Error, Debug)]
pub enum StepError {
    // Cache key errors
    #[error("Missing cache input files under {root}: {names}", names = .files.join(", "))]
    MissingInputs { root: PathBuf, files: Vec<String> },

    #[error("Failed to read cache input {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cache key prefix '{prefix}': {reason}")]
    InvalidCacheKey { prefix: String, reason: String },

    #[error("Failed to resolve cache volume {name}: {reason}")]
    VolumeResolution { name: String, reason: String },

    // Pipeline errors
    #[error("Customizer #{index} ({name}) failed: {source}")]
    Customization {
        index: usize,
        name: String,
        #[source]
        source: Box<StepError>,
    },

    #[error("Container command failed ({}): {output}", exit_description(.code))]
    Execution { code: Option<i32>, output: String },

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("Secret {0} is not available. Export it in the host environment")]
    SecretNotFound(String),

    // Runtime errors
    #[error("Podman not found. Install podman to run pipeline steps locally")]
    PodmanNotFound,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path: {path}: {reason}")]
    PathInvalid { path: PathBuf, reason: String },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "could not start".to_string(),
    }
}

impl StepError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Whether this error, or the customizer failure it wraps, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Customization { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// The innermost error, looking through customizer wrapping
    pub fn root_cause(&self) -> &StepError {
        match self {
            Self::Customization { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root_cause() {
            Self::MissingInputs { .. } => {
                Some("Cache keys hash tracked files from the working directory. Check that they exist")
            }
            Self::PodmanNotFound => Some("See https://podman.io/docs/installation"),
            Self::SecretNotFound(_) => Some("Secrets are read from the host environment once per run"),
            Self::Cancelled => Some("The run was interrupted; re-run the step to retry"),
            _ => None,
        }
    }
}
