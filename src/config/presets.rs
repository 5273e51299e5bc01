//! Built-in pipelines
//!
//! The Go preset is what `localci run` uses when the project has no
//! pipeline file: build, test, format check, then push under a deadline.

use std::path::Path;
use std::time::Duration;

use crate::engine::steps::{ExecStep, OutputCheck, TimeoutStep, ValidatingStep};
use crate::engine::Pipeline;

pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how the final step pushes
#[derive(Debug, Clone)]
pub struct PushOptions {
    pub remote: String,
    pub branch: String,
    pub timeout: Duration,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }
}

/// `go build`, `go test`, `go fmt` (gofmt must list nothing), `git push`
pub fn go_pipeline(project: &Path, push: &PushOptions) -> Pipeline {
    Pipeline::new()
        .step(ExecStep::new(
            "go build",
            "go",
            "Go Build: SUCCESS",
            project,
            // Building more than one package discards the results
            ["build", ".", "errors"],
        ))
        .step(ExecStep::new(
            "go test",
            "go",
            "Go Test: SUCCESS",
            project,
            ["test", "-v"],
        ))
        .step(ValidatingStep::new(
            ExecStep::new("go fmt", "gofmt", "Gofmt: SUCCESS", project, ["-l", "."]),
            OutputCheck::Empty,
        ))
        .step(TimeoutStep::new(
            ExecStep::new(
                "git push",
                "git",
                "Git Push: SUCCESS",
                project,
                ["push", push.remote.as_str(), push.branch.as_str()],
            )
            .with_env("GIT_TERMINAL_PROMPT", "0"),
            push.timeout,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_pipeline_steps() {
        let pipeline = go_pipeline(Path::new("/tmp/proj"), &PushOptions::default());
        assert_eq!(
            pipeline.step_names(),
            vec!["go build", "go test", "go fmt", "git push"]
        );
    }

    #[test]
    fn test_push_defaults() {
        let push = PushOptions::default();
        assert_eq!(push.remote, "origin");
        assert_eq!(push.branch, "main");
        assert_eq!(push.timeout, Duration::from_secs(10));
    }
}
