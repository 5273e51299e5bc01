//! Step implementations
//!
//! Every step exposes the same capability: run once and report either its
//! success message or a [`StepError`] naming it.
//!
//! - `exec` - plain command; succeeds on exit code zero
//! - `validate` - plain command plus a check on its captured output
//! - `timeout` - wraps any step with a wall-clock deadline

use async_trait::async_trait;

use crate::engine::context::RunContext;
use crate::engine::error::StepError;

pub mod exec;
pub mod timeout;
pub mod validate;

pub use exec::ExecStep;
pub use timeout::TimeoutStep;
pub use validate::{OutputCheck, ValidatingStep};

/// One unit of pipeline work
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in errors and logs
    fn name(&self) -> &str;

    /// Run the step, returning its success message
    async fn execute(&self, ctx: &RunContext) -> Result<String, StepError>;
}

#[async_trait]
impl<S: Step + ?Sized> Step for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(&self, ctx: &RunContext) -> Result<String, StepError> {
        (**self).execute(ctx).await
    }
}
