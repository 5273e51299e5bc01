//! Timeout-bound step
//!
//! Wraps another step and gives it a wall-clock budget. The deadline
//! travels in the [`RunContext`]; the command runner kills the process tree
//! when it passes and the wrapped step fails with a timeout cause.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use super::Step;
use crate::engine::context::RunContext;
use crate::engine::error::StepError;

pub struct TimeoutStep {
    inner: Box<dyn Step>,
    timeout: Duration,
}

impl TimeoutStep {
    pub fn new(inner: impl Step + 'static, timeout: Duration) -> Self {
        Self {
            inner: Box::new(inner),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for TimeoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutStep")
            .field("inner", &self.inner.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Step for TimeoutStep {
    fn name(&self) -> &str {
        self.inner.name()
    }

    #[instrument(skip(self, ctx), fields(step = %self.inner.name(), timeout_ms = self.timeout.as_millis() as u64))]
    async fn execute(&self, ctx: &RunContext) -> Result<String, StepError> {
        self.inner.execute(&ctx.with_timeout(self.timeout)).await
    }
}
