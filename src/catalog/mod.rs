//! Ready-made pipeline steps built from the customizer primitives
//!
//! Each step takes its config (defaults, file, then options) and a
//! `RuntimeContext`, runs a container and returns its stdout.

pub mod precommit;
pub mod svu;
