//! File set hashing for content-addressed cache keys
//!
//! Same tracked paths with the same contents = same digest. Files that do
//! not exist are left out of the digest; a set with no existing file at all
//! is rejected.

use crate::error::{StepError, StepResult};
use crate::runtime::CancelSignal;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Leading bytes of every hash input. Bump when the framing changes.
const FRAMING_TAG: &[u8] = b"stepwright-cache-v1\0";

/// 32-byte SHA-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Ordered list of files, relative to a root, that feed a cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    root: PathBuf,
    files: Vec<PathBuf>,
    require_all: bool,
}

impl FileSet {
    /// Build a file set. Paths must be relative and stay inside `root`.
    pub fn new<I, P>(root: impl Into<PathBuf>, files: I) -> StepResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files = files
            .into_iter()
            .map(|p| validate_relative(p.as_ref()))
            .collect::<StepResult<Vec<_>>>()?;

        Ok(Self {
            root: root.into(),
            files,
            require_all: false,
        })
    }

    /// Treat any absent file as `MissingInputs` instead of skipping it
    pub fn require_all(mut self) -> Self {
        self.require_all = true;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn missing_error(&self, entries: &[FileEntry]) -> StepError {
        StepError::MissingInputs {
            root: self.root.clone(),
            files: entries
                .iter()
                .filter(|e| !e.exists)
                .map(|e| portable(&e.path))
                .collect(),
        }
    }
}

/// A tracked file and whether it existed when hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub exists: bool,
}

/// Result of hashing a file set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub digest: ContentDigest,
    pub entries: Vec<FileEntry>,
}

impl FileDigest {
    /// Tracked files that were absent and did not contribute to the digest
    pub fn missing(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|e| !e.exists)
            .map(|e| e.path.as_path())
    }
}

fn validate_relative(path: &Path) -> StepResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(StepError::PathInvalid {
            path: path.to_path_buf(),
            reason: "empty path".to_string(),
        });
    }

    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(StepError::PathInvalid {
                    path: path.to_path_buf(),
                    reason: "must not contain '..'".to_string(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StepError::PathInvalid {
                    path: path.to_path_buf(),
                    reason: "must be relative to the working directory".to_string(),
                })
            }
        }
    }

    Ok(path.to_path_buf())
}

/// Path rendered with `/` separators so digests match across platforms
fn portable(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Read a tracked file. `Ok(None)` when it does not exist.
async fn read_tracked(path: &Path) -> StepResult<Option<Vec<u8>>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if !meta.is_file() => return Ok(None),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StepError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }

    tokio::fs::read(path)
        .await
        .map(Some)
        .map_err(|e| StepError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Hash the contents of every existing file in the set, in order
pub async fn hash_file_set(set: &FileSet, cancel: &CancelSignal) -> StepResult<FileDigest> {
    let mut hasher = Sha256::new();
    hasher.update(FRAMING_TAG);

    let mut entries = Vec::with_capacity(set.files.len());

    for file in &set.files {
        let full_path = set.root.join(file);
        let contents = cancel.guard(read_tracked(&full_path)).await?;

        let exists = match contents {
            Some(bytes) => {
                let name = portable(file);
                hasher.update((name.len() as u64).to_be_bytes());
                hasher.update(name.as_bytes());
                hasher.update((bytes.len() as u64).to_be_bytes());
                hasher.update(&bytes);
                true
            }
            None => {
                debug!("Cache input not found, skipping: {}", full_path.display());
                false
            }
        };

        entries.push(FileEntry {
            path: file.clone(),
            exists,
        });
    }

    let present = entries.iter().filter(|e| e.exists).count();
    if present == 0 || (set.require_all && present != entries.len()) {
        return Err(set.missing_error(&entries));
    }

    let digest = ContentDigest(hasher.finalize().into());
    debug!(
        "Hashed {} of {} cache inputs under {}: {}",
        present,
        entries.len(),
        set.root.display(),
        digest
    );

    Ok(FileDigest { digest, entries })
}
