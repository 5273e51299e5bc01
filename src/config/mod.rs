//! Pipeline configuration
//!
//! - `definition` - Serde types for pipeline files and their validation
//! - `loader` - Load pipeline files from disk
//! - `presets` - Built-in pipelines (Go build/test/fmt/push)

pub mod definition;
pub mod loader;
pub mod presets;

pub use definition::{ConfigError, ExpectKeyword, Expectation, PipelineDefinition, StepDefinition};
pub use loader::{LoadError, PipelineLoader, DEFAULT_PIPELINE_FILE};
pub use presets::{go_pipeline, PushOptions, DEFAULT_PUSH_TIMEOUT};
