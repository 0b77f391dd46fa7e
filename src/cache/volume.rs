//! Cache keys and cache volume resolution
//!
//! A cache key is `prefix + hex(digest)`. The volume itself belongs to the
//! build client's namespace: this module only asks for it by name, every
//! time, and never remembers whether a volume existed.

use crate::cache::hasher::{hash_file_set, ContentDigest, FileSet};
use crate::error::{StepError, StepResult};
use crate::runtime::{BuildClient, CancelSignal};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Volume label keys used to track cache metadata
pub mod labels {
    /// Marks volume as a stepwright cache
    pub const STEPWRIGHT_CACHE: &str = "io.stepwright.cache";
    /// Logical prefix of the key (e.g. `go-build-`)
    pub const PREFIX: &str = "io.stepwright.cache.prefix";
    /// Hex digest of the tracked files
    pub const DIGEST: &str = "io.stepwright.cache.digest";
    /// Creation timestamp (RFC3339)
    pub const CREATED_AT: &str = "io.stepwright.cache.created_at";
}

/// Stable identity of a cache volume
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: String,
    digest: ContentDigest,
}

impl CacheKey {
    /// Build a key, checking the prefix can be part of a volume name
    pub fn new(prefix: impl Into<String>, digest: ContentDigest) -> StepResult<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { prefix, digest })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Volume name for this key
    pub fn volume_name(&self) -> String {
        format!("{}{}", self.prefix, self.digest.to_hex())
    }

    /// Labels to attach when the client creates the volume
    pub fn labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(labels::STEPWRIGHT_CACHE.to_string(), "true".to_string());
        labels.insert(labels::PREFIX.to_string(), self.prefix.clone());
        labels.insert(labels::DIGEST.to_string(), self.digest.to_hex());
        labels.insert(labels::CREATED_AT.to_string(), Utc::now().to_rfc3339());
        labels
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.digest)
    }
}

fn validate_prefix(prefix: &str) -> StepResult<()> {
    let invalid = |reason: &str| StepError::InvalidCacheKey {
        prefix: prefix.to_string(),
        reason: reason.to_string(),
    };

    match prefix.chars().next() {
        None => return Err(invalid("prefix cannot be empty")),
        Some(c) if !c.is_ascii_alphanumeric() => {
            return Err(invalid("must start with a letter or digit"))
        }
        Some(_) => {}
    }

    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(
            "must contain only alphanumeric characters, '-', '_' or '.'",
        ));
    }

    Ok(())
}

/// A named persistent volume in the build client's namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVolume {
    /// Volume name ({prefix}{digest})
    pub name: String,
    /// Key prefix, when known
    pub prefix: Option<String>,
    /// Hex digest, when known
    pub digest: Option<String>,
    /// When the volume was first created, when known
    pub created_at: Option<DateTime<Utc>>,
}

impl CacheVolume {
    /// A volume known only by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            digest: None,
            created_at: None,
        }
    }

    /// Volume record for a key
    pub fn for_key(key: &CacheKey) -> Self {
        Self {
            name: key.volume_name(),
            prefix: Some(key.prefix().to_string()),
            digest: Some(key.digest().to_hex()),
            created_at: None,
        }
    }

    /// Try to parse from volume labels. `None` for volumes stepwright didn't create.
    pub fn from_labels(name: &str, labels: &HashMap<String, String>) -> Option<Self> {
        if labels.get(labels::STEPWRIGHT_CACHE).map(String::as_str) != Some("true") {
            return None;
        }

        let created_at = labels
            .get(labels::CREATED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Some(Self {
            name: name.to_string(),
            prefix: labels.get(labels::PREFIX).cloned(),
            digest: labels.get(labels::DIGEST).cloned(),
            created_at,
        })
    }
}

/// Derive the cache key for `files` under `workdir`
pub async fn cache_key_for_files(
    prefix: &str,
    workdir: &Path,
    files: &[&str],
    cancel: &CancelSignal,
) -> StepResult<CacheKey> {
    let set = FileSet::new(workdir, files)?;
    cache_key_for_set(prefix, &set, cancel).await
}

/// Derive the cache key for a prepared file set
pub async fn cache_key_for_set(
    prefix: &str,
    set: &FileSet,
    cancel: &CancelSignal,
) -> StepResult<CacheKey> {
    let hashed = hash_file_set(set, cancel).await?;
    CacheKey::new(prefix, hashed.digest)
}

/// Resolve (or lazily create) the cache volume for a key
pub async fn resolve_key(
    client: &dyn BuildClient,
    key: &CacheKey,
    cancel: &CancelSignal,
) -> StepResult<CacheVolume> {
    debug!("Resolving cache volume {} via {}", key, client.client_name());

    match cancel.guard(client.volume(key)).await {
        Ok(volume) => {
            info!(volume = %volume.name, "Cache volume ready");
            Ok(volume)
        }
        Err(e @ (StepError::Cancelled | StepError::VolumeResolution { .. })) => Err(e),
        Err(e) => Err(StepError::VolumeResolution {
            name: key.volume_name(),
            reason: e.to_string(),
        }),
    }
}

/// Hash `files` under `workdir` and resolve the matching cache volume
pub async fn resolve_cache_volume(
    client: &dyn BuildClient,
    prefix: &str,
    workdir: &Path,
    files: &[&str],
    cancel: &CancelSignal,
) -> StepResult<CacheVolume> {
    let key = cache_key_for_files(prefix, workdir, files, cancel).await?;
    resolve_key(client, &key, cancel).await
}
