//! Container customizers and the customization pipeline
//!
//! A customizer is one container mutation (set env vars, mount a cache,
//! download a file, install a tool). Customizers capture everything they
//! need at construction and are applied in order by `apply_customizations`,
//! which stops at the first failure and reports which step failed.

mod cache;
mod download;
mod env;
mod install;

pub use cache::{MountedCache, MountedGoCache};
pub use download::{DownloadExecutableFile, DownloadFile};
pub use env::{AppendToPath, EnvVariables};
pub use install::{InstallCliTool, InstallToolchain};

use crate::container::{ContainerState, WORKDIR_MOUNT};
use crate::error::{StepError, StepResult};
use crate::runtime::RuntimeContext;
use async_trait::async_trait;
use tracing::debug;

/// Boxed customizer, the element type of a pipeline
pub type BoxedCustomizer = Box<dyn Customizer>;

/// A unit of container mutation
#[async_trait]
pub trait Customizer: Send + Sync {
    /// Semantic name used in logs and error messages
    fn name(&self) -> String;

    /// Produce the next container state, or fail
    async fn apply(&self, ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState>;

    fn boxed(self) -> BoxedCustomizer
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// Customizer backed by a plain function
pub struct FnCustomizer<F> {
    name: String,
    f: F,
}

/// Wrap a synchronous function as a named customizer
pub fn customizer_fn<F>(name: impl Into<String>, f: F) -> FnCustomizer<F>
where
    F: Fn(&RuntimeContext, ContainerState) -> StepResult<ContainerState> + Send + Sync,
{
    FnCustomizer {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F> Customizer for FnCustomizer<F>
where
    F: Fn(&RuntimeContext, ContainerState) -> StepResult<ContainerState> + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn apply(&self, ctx: &RuntimeContext, state: ContainerState) -> StepResult<ContainerState> {
        (self.f)(ctx, state)
    }
}

/// Apply customizers strictly left to right.
///
/// The first failure stops the pipeline and is returned as
/// `StepError::Customization` naming the step; nothing after it runs.
/// Cancellation is checked before every step and returned unwrapped.
pub async fn apply_customizations(
    ctx: &RuntimeContext,
    base: ContainerState,
    customizers: &[BoxedCustomizer],
) -> StepResult<ContainerState> {
    let mut state = base;

    for (index, customizer) in customizers.iter().enumerate() {
        let name = customizer.name();
        debug!(
            invocation = %ctx.invocation_id(),
            step = index,
            customizer = %name,
            "Applying customizer"
        );

        state = match ctx.guard(customizer.apply(ctx, state)).await {
            Ok(next) => next,
            Err(StepError::Cancelled) => return Err(StepError::Cancelled),
            Err(e) => {
                return Err(StepError::Customization {
                    index,
                    name,
                    source: Box::new(e),
                })
            }
        };
    }

    Ok(state)
}

/// Build a container from `image`, optionally mount the working directory
/// at `/src` (and work there), then apply the customizers.
pub async fn customized_container_from_image(
    ctx: &RuntimeContext,
    image: &str,
    mount_workdir: bool,
    customizers: &[BoxedCustomizer],
) -> StepResult<ContainerState> {
    let mut base = ContainerState::from_image(image);

    if mount_workdir {
        base = base
            .with_mounted_directory(WORKDIR_MOUNT, ctx.workdir())
            .with_workdir(WORKDIR_MOUNT);
    }

    apply_customizations(ctx, base, customizers).await
}
