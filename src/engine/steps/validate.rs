//! Validating exec step
//!
//! Some tools report problems on stdout while exiting zero (`gofmt -l`
//! lists unformatted files). A validating step runs the command like
//! [`ExecStep`] and then checks the captured output.

use std::fmt;

use async_trait::async_trait;
use regex::Regex;
use tracing::instrument;

use super::{ExecStep, Step};
use crate::engine::command::excerpt;
use crate::engine::context::RunContext;
use crate::engine::error::{StepError, StepFailure};

/// Predicate on a command's combined output
#[derive(Debug, Clone)]
pub enum OutputCheck {
    /// Nothing but whitespace
    Empty,
    /// Equal to the string once surrounding whitespace is trimmed
    Equals(String),
    Contains(String),
    Matches(Regex),
}

impl OutputCheck {
    pub fn verify(&self, output: &str) -> Result<(), StepFailure> {
        let ok = match self {
            OutputCheck::Empty => output.trim().is_empty(),
            OutputCheck::Equals(expected) => output.trim() == expected.trim(),
            OutputCheck::Contains(needle) => output.contains(needle.as_str()),
            OutputCheck::Matches(re) => re.is_match(output),
        };

        if ok {
            Ok(())
        } else {
            let excerpt = excerpt(output);
            Err(StepFailure::Validation {
                expected: self.to_string(),
                excerpt: if excerpt.is_empty() {
                    "(no output)".to_string()
                } else {
                    excerpt
                },
            })
        }
    }
}

impl fmt::Display for OutputCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputCheck::Empty => write!(f, "no output"),
            OutputCheck::Equals(s) => write!(f, "output equal to {:?}", s),
            OutputCheck::Contains(s) => write!(f, "output containing {:?}", s),
            OutputCheck::Matches(re) => write!(f, "output matching /{}/", re.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatingStep {
    exec: ExecStep,
    check: OutputCheck,
}

impl ValidatingStep {
    pub fn new(exec: ExecStep, check: OutputCheck) -> Self {
        Self { exec, check }
    }

    pub fn check(&self) -> &OutputCheck {
        &self.check
    }
}

#[async_trait]
impl Step for ValidatingStep {
    fn name(&self) -> &str {
        self.exec.name()
    }

    #[instrument(skip(self, ctx), fields(step = %self.exec.name()))]
    async fn execute(&self, ctx: &RunContext) -> Result<String, StepError> {
        let output = self.exec.run_command(ctx).await?;
        self.check
            .verify(&output.text())
            .map_err(|cause| StepError::new(self.exec.name(), cause))?;
        Ok(self.exec.message().to_string())
    }
}
