//! Engine error types
//!
//! Three layers, innermost first:
//! - [`CommandError`] - what the command runner reports about one process
//! - [`StepFailure`] - the cause a step wraps (runner error or output mismatch)
//! - [`StepError`] - the cause tagged with the failing step's name
//!
//! [`PipelineError`] is what a pipeline run returns.

use std::fmt;
use std::io;
use std::time::Duration;

/// Errors reported by the command runner for a single process
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("executable {program:?} not found: {source}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to start {program:?}: {source}")]
    Start {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program:?} exited with {}{}", exit_detail(.code), output_detail(.output))]
    Exit {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn exit_detail(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

fn output_detail(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(":\n{}", output)
    }
}

/// The cause wrapped by a [`StepError`]
#[derive(Debug, thiserror::Error)]
pub enum StepFailure {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("output check failed (expected {expected}):\n{excerpt}")]
    Validation { expected: String, excerpt: String },
}

/// Coarse classification of a step failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Start,
    Exit,
    Validation,
    Timeout,
    Cancelled,
    Io,
}

impl StepFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            StepFailure::Validation { .. } => FailureKind::Validation,
            StepFailure::Command(err) => match err {
                CommandError::NotFound { .. } => FailureKind::NotFound,
                CommandError::Start { .. } => FailureKind::Start,
                CommandError::Exit { .. } => FailureKind::Exit,
                CommandError::TimedOut(_) => FailureKind::Timeout,
                CommandError::Cancelled => FailureKind::Cancelled,
                CommandError::Io(_) => FailureKind::Io,
            },
        }
    }
}

/// A step failure tagged with the name of the step that produced it.
///
/// Equality looks at the step name only, so a caller can check which step
/// failed without depending on the underlying cause:
///
/// ```
/// use localci::{CommandError, StepError};
///
/// let a = StepError::new("go build", CommandError::Cancelled);
/// let b = StepError::new("go build", std::io::Error::other("boom"));
/// assert_eq!(a, b);
/// assert_eq!(a, "go build");
/// ```
#[derive(Debug, thiserror::Error)]
#[error("step {step:?} failed: {cause}")]
pub struct StepError {
    step: String,
    #[source]
    cause: StepFailure,
}

impl StepError {
    pub fn new(step: impl Into<String>, cause: impl Into<StepFailure>) -> Self {
        Self {
            step: step.into(),
            cause: cause.into(),
        }
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn cause(&self) -> &StepFailure {
        &self.cause
    }

    pub fn kind(&self) -> FailureKind {
        self.cause.kind()
    }

    pub fn into_cause(self) -> StepFailure {
        self.cause
    }
}

impl From<io::Error> for StepFailure {
    fn from(err: io::Error) -> Self {
        StepFailure::Command(CommandError::Io(err))
    }
}

impl PartialEq for StepError {
    fn eq(&self, other: &Self) -> bool {
        self.step == other.step
    }
}

impl Eq for StepError {}

impl PartialEq<str> for StepError {
    fn eq(&self, other: &str) -> bool {
        self.step == other
    }
}

impl PartialEq<&str> for StepError {
    fn eq(&self, other: &&str) -> bool {
        self.step == *other
    }
}

/// Errors returned by a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error("failed to write output of step {step:?}: {source}")]
    Output {
        step: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// The step error, if the run stopped because a step failed
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            PipelineError::Step(err) => Some(err),
            PipelineError::Output { .. } => None,
        }
    }

    /// Name of the step the run stopped at
    pub fn failed_step(&self) -> &str {
        match self {
            PipelineError::Step(err) => err.step(),
            PipelineError::Output { step, .. } => step,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::NotFound => "not-found",
            FailureKind::Start => "start",
            FailureKind::Exit => "exit",
            FailureKind::Validation => "validation",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Io => "io",
        };
        f.write_str(s)
    }
}
