//! # localci
//!
//! A local continuous-integration runner. Given a project directory it runs
//! an ordered pipeline of external commands (build, test, format check,
//! push) and stops at the first failure, reporting which step failed and
//! why.
//!
//! ## Features
//!
//! - **Fail-fast pipelines** - steps run strictly in order, one at a time
//! - **Three step kinds** - plain exec, output-validating exec, and
//!   deadline-bound exec that kills the whole process tree on expiry
//! - **Step-named errors** - [`StepError`] compares equal by step name, so
//!   callers can check *which* step failed without matching message text
//! - **YAML pipelines** - or the built-in Go preset
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use localci::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let project = Path::new("./my-tool");
//!     let pipeline = Pipeline::new()
//!         .step(ExecStep::new("go build", "go", "Go Build: SUCCESS", project, ["build", "."]))
//!         .step(ExecStep::new("go test", "go", "Go Test: SUCCESS", project, ["test", "-v"]));
//!
//!     let mut out = std::io::stdout();
//!     match pipeline.run(&mut out).await {
//!         Ok(_) => Ok(()),
//!         Err(e) if e.failed_step() == "go build" => {
//!             eprintln!("does not compile: {}", e);
//!             std::process::exit(1);
//!         }
//!         Err(e) => Err(e.into()),
//!     }
//! }
//! ```

pub mod config;
pub mod engine;

// Re-export main types
pub use config::{
    go_pipeline, ConfigError, Expectation, LoadError, PipelineDefinition, PipelineLoader,
    PushOptions, StepDefinition,
};
pub use engine::{
    CommandError, CommandOutput, CommandSpec, ExecStep, FailureKind, OutputCheck, Pipeline,
    PipelineError, PipelineReport, PipelineState, RunContext, Step, StepError, StepFailure,
    StepReport, TimeoutStep, ValidatingStep,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{go_pipeline, PipelineDefinition, PipelineLoader, PushOptions};
    pub use crate::engine::{
        ExecStep, FailureKind, OutputCheck, Pipeline, PipelineError, RunContext, Step, StepError,
        TimeoutStep, ValidatingStep,
    };
}
