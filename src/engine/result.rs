//! Execution result types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A step that completed successfully
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    pub message: String,
    pub duration: Duration,
}

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: String,
    pub state: PipelineState,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl PipelineReport {
    pub fn messages(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.message.as_str()).collect()
    }
}
