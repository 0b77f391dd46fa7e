//! Immutable container specifications
//!
//! A `ContainerState` describes what a build client should run: base image,
//! environment, mounts and pending exec steps. Builder methods consume the
//! state and return the next revision, so a stale value can never be reused
//! after it has been transformed.

mod state;

pub use state::{CacheMount, ContainerState, Secret, DEFAULT_PATH, WORKDIR_MOUNT};
