//! Content-addressed cache volumes
//!
//! Cache keys are derived from the contents of tracked files (lockfiles,
//! tool configs). Same files = same key = same volume, across runs and
//! across concurrent CI jobs.
//!
//! # Key derivation
//!
//! | Input | Effect |
//! |-------|--------|
//! | Tracked path | Part of the digest |
//! | File contents | Part of the digest |
//! | Absent file | Skipped (no signal) |
//! | No file present | `MissingInputs` |

pub mod hasher;
pub mod volume;

pub use hasher::{hash_file_set, ContentDigest, FileDigest, FileEntry, FileSet};
pub use volume::{
    cache_key_for_files, cache_key_for_set, labels, resolve_cache_volume, resolve_key, CacheKey,
    CacheVolume,
};
