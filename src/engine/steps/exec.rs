//! Plain exec step
//!
//! Runs a command in the project directory and reports the configured
//! message on exit code zero. Output content is never inspected.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::Step;
use crate::engine::command::{CommandOutput, CommandSpec};
use crate::engine::context::RunContext;
use crate::engine::error::StepError;

#[derive(Debug, Clone)]
pub struct ExecStep {
    name: String,
    exe: String,
    message: String,
    dir: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    input: Option<Vec<u8>>,
}

impl ExecStep {
    pub fn new<I, S>(
        name: impl Into<String>,
        exe: impl Into<String>,
        message: impl Into<String>,
        dir: impl AsRef<Path>,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            exe: exe.into(),
            message: message.into(),
            dir: dir.as_ref().to_path_buf(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            input: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_envs(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn exe(&self) -> &str {
        &self.exe
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.exe, &self.dir).args(self.args.iter().cloned());
        spec.env = self.env.clone();
        spec.input = self.input.clone();
        spec
    }

    /// Run the command, attributing any runner error to this step
    pub(crate) async fn run_command(&self, ctx: &RunContext) -> Result<CommandOutput, StepError> {
        let output = self
            .command()
            .run(ctx)
            .await
            .map_err(|e| StepError::new(&self.name, e))?;
        debug!(
            step = %self.name,
            elapsed_ms = output.duration.as_millis() as u64,
            bytes = output.output.len(),
            "command finished"
        );
        Ok(output)
    }
}

#[async_trait]
impl Step for ExecStep {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, ctx), fields(step = %self.name))]
    async fn execute(&self, ctx: &RunContext) -> Result<String, StepError> {
        self.run_command(ctx).await?;
        Ok(self.message.clone())
    }
}
