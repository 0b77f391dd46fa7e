//! Stepwright - composable building blocks for containerized CI steps
//!
//! A step is a base image, a pipeline of customizers (env vars, cache
//! mounts, downloads, tool installs) and a final command. Cache volumes
//! are keyed by the contents of tracked files, so identical inputs share
//! a volume across runs and concurrent jobs.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod container;
pub mod customize;
pub mod error;
pub mod runtime;
pub mod ui;

pub use error::{StepError, StepResult};
