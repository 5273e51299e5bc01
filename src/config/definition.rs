//! Pipeline and step definitions
//!
//! A pipeline file describes the steps to run against a project:
//!
//! ```yaml
//! name: go-ci
//! env:
//!   GOFLAGS: -mod=mod
//! steps:
//!   - name: go build
//!     exe: go
//!     args: [build, ., errors]
//!     message: "Go Build: SUCCESS"
//!
//!   - name: go fmt
//!     exe: gofmt
//!     args: [-l, .]
//!     message: "Gofmt: SUCCESS"
//!     expect: empty
//!
//!   - name: git push
//!     exe: git
//!     args: [push, origin, main]
//!     message: "Git Push: SUCCESS"
//!     timeout: 10000
//! ```
//!
//! `expect` turns a step into a validating step; `timeout` (milliseconds)
//! bounds it with a deadline. Both may be combined.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::steps::{ExecStep, OutputCheck, Step, TimeoutStep, ValidatingStep};
use crate::engine::Pipeline;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pipeline has no steps")]
    NoSteps,

    #[error("step {index} has an empty name")]
    EmptyName { index: usize },

    #[error("step {step:?} has no executable")]
    EmptyExe { step: String },

    #[error("duplicate step name {0:?}")]
    DuplicateStep(String),

    #[error("step {step:?} has a zero timeout")]
    ZeroTimeout { step: String },

    #[error("step {step:?} has an invalid pattern: {source}")]
    InvalidPattern {
        step: String,
        #[source]
        source: regex::Error,
    },
}

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name (for logging)
    #[serde(default)]
    pub name: Option<String>,

    /// Environment variables added to every step
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Steps, in execution order
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// A single step definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step name, used to identify failures
    pub name: String,

    /// Executable name or path
    pub exe: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Line written to the output when the step succeeds
    #[serde(default)]
    pub message: Option<String>,

    /// Working directory relative to the project directory
    #[serde(default)]
    pub dir: Option<String>,

    /// Step-level environment variables (override pipeline-level ones)
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Text written to the command's stdin
    #[serde(default)]
    pub input: Option<String>,

    /// Output expectation
    #[serde(default)]
    pub expect: Option<Expectation>,

    /// Timeout in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Serialized form of [`OutputCheck`]: `empty`, or a single-key map
/// (`equals:`, `contains:`, `matches:`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expectation {
    Keyword(ExpectKeyword),
    Equals { equals: String },
    Contains { contains: String },
    Matches { matches: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectKeyword {
    Empty,
}

impl Expectation {
    fn to_check(&self, step: &str) -> Result<OutputCheck, ConfigError> {
        Ok(match self {
            Expectation::Keyword(ExpectKeyword::Empty) => OutputCheck::Empty,
            Expectation::Equals { equals } => OutputCheck::Equals(equals.clone()),
            Expectation::Contains { contains } => OutputCheck::Contains(contains.clone()),
            Expectation::Matches { matches } => {
                let re = Regex::new(matches).map_err(|source| ConfigError::InvalidPattern {
                    step: step.to_string(),
                    source,
                })?;
                OutputCheck::Matches(re)
            }
        })
    }
}

impl PipelineDefinition {
    /// Check the definition without building it
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }

        let mut seen = HashSet::new();
        for (idx, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(ConfigError::EmptyName { index: idx + 1 });
            }
            if step.exe.trim().is_empty() {
                return Err(ConfigError::EmptyExe {
                    step: step.name.clone(),
                });
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ConfigError::DuplicateStep(step.name.clone()));
            }
            if step.timeout == Some(0) {
                return Err(ConfigError::ZeroTimeout {
                    step: step.name.clone(),
                });
            }
            if let Some(expect) = &step.expect {
                expect.to_check(&step.name)?;
            }
        }
        Ok(())
    }

    /// Build a runnable pipeline bound to `project`
    pub fn build(&self, project: &Path) -> Result<Pipeline, ConfigError> {
        self.validate()?;

        let mut pipeline = Pipeline::new();
        for step in &self.steps {
            pipeline.push(step.build(project, &self.env)?);
        }
        Ok(pipeline)
    }
}

impl StepDefinition {
    pub fn build(
        &self,
        project: &Path,
        shared_env: &BTreeMap<String, String>,
    ) -> Result<Box<dyn Step>, ConfigError> {
        let dir = match &self.dir {
            Some(sub) => project.join(sub),
            None => project.to_path_buf(),
        };
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("{}: SUCCESS", self.name));

        let mut env = shared_env.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut exec = ExecStep::new(&self.name, &self.exe, message, dir, self.args.iter().cloned())
            .with_envs(env);
        if let Some(input) = &self.input {
            exec = exec.with_input(input.as_bytes());
        }

        let step: Box<dyn Step> = match &self.expect {
            Some(expect) => Box::new(ValidatingStep::new(exec, expect.to_check(&self.name)?)),
            None => Box::new(exec),
        };

        match self.timeout {
            Some(0) => Err(ConfigError::ZeroTimeout {
                step: self.name.clone(),
            }),
            Some(ms) => Ok(Box::new(TimeoutStep::new(step, Duration::from_millis(ms)))),
            None => Ok(step),
        }
    }
}
