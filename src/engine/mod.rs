//! Pipeline execution engine
//!
//! This module contains:
//! - `command` - Command runner for a single external process
//! - `context` - Cancellation token and deadline passed to every step
//! - `steps` - The `Step` trait and its exec/validating/timeout variants
//! - `pipeline` - Ordered, fail-fast step sequencing
//! - `error` - Runner, step, and pipeline error types
//! - `result` - Step and pipeline reports

pub mod command;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod result;
pub mod steps;

pub use command::{CommandOutput, CommandSpec};
pub use context::RunContext;
pub use error::{CommandError, FailureKind, PipelineError, StepError, StepFailure};
pub use pipeline::Pipeline;
pub use result::{PipelineReport, PipelineState, StepReport};
pub use steps::{ExecStep, OutputCheck, Step, TimeoutStep, ValidatingStep};
