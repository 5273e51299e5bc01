//! Pipeline - ordered, fail-fast sequence of steps
//!
//! Steps run one at a time in insertion order. Each success message is
//! written to the sink and flushed before the next step starts; the first
//! failure ends the run and is returned as-is.

use std::io::Write;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use crate::engine::result::{PipelineReport, PipelineState, StepReport};
use crate::engine::steps::Step;

#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// Append a step; insertion order is execution order
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn run<W>(&self, out: &mut W) -> Result<PipelineReport, PipelineError>
    where
        W: Write + Send,
    {
        self.run_with_context(&RunContext::new(), out).await
    }

    /// Run every step in order, writing one line per success to `out`.
    ///
    /// Cancelling `ctx` kills the running step's process tree; that step
    /// then fails with a cancelled cause and the run stops there.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run_with_context<W>(
        &self,
        ctx: &RunContext,
        out: &mut W,
    ) -> Result<PipelineReport, PipelineError>
    where
        W: Write + Send,
    {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let started_at = Utc::now();
        let started = Instant::now();
        let mut state = PipelineState::Idle;
        let mut completed = Vec::with_capacity(self.steps.len());

        transition(&mut state, PipelineState::Running);
        info!(steps = self.steps.len(), "pipeline started");

        for (idx, step) in self.steps.iter().enumerate() {
            let name = step.name();
            info!(step = %name, index = idx + 1, "executing step");
            let step_started = Instant::now();

            let message = match step.execute(ctx).await {
                Ok(message) => message,
                Err(e) => {
                    error!(step = %name, kind = %e.kind(), "step failed: {}", e.cause());
                    transition(&mut state, PipelineState::Failed);
                    return Err(e.into());
                }
            };

            if let Err(source) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
                error!(step = %name, error = %source, "failed to write step output");
                transition(&mut state, PipelineState::Failed);
                return Err(PipelineError::Output {
                    step: name.to_string(),
                    source,
                });
            }

            let duration = step_started.elapsed();
            info!(step = %name, elapsed_ms = duration.as_millis() as u64, "step succeeded");
            completed.push(StepReport {
                name: name.to_string(),
                message,
                duration,
            });
        }

        transition(&mut state, PipelineState::Succeeded);
        info!(steps = completed.len(), "pipeline succeeded");

        Ok(PipelineReport {
            run_id,
            state,
            steps: completed,
            started_at,
            duration: started.elapsed(),
        })
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = %state, to = %next, "pipeline state");
    *state = next;
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}
