//! CLI command implementations

pub mod cache;
pub mod precommit;
pub mod svu;

pub use cache::execute as cache;
pub use precommit::execute as precommit;
pub use svu::execute as svu;

use crate::runtime::{BuildClient, CancelSignal, RuntimeContext, RuntimeContextBuilder};
use crate::ui::UiContext;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-process state shared by every command
#[derive(Debug, Clone)]
pub struct Invocation {
    pub workdir: PathBuf,
    pub cancel: CancelSignal,
    pub ui: UiContext,
}

impl Invocation {
    /// Start a runtime context rooted at the working directory
    pub fn runtime(&self, client: Arc<dyn BuildClient>) -> RuntimeContextBuilder {
        RuntimeContext::builder(client, self.workdir.clone()).cancel_signal(self.cancel.clone())
    }
}
