use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use localci::config::DEFAULT_PUSH_TIMEOUT;
use localci::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "localci")]
#[command(about = "Run a local CI pipeline against a project", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for a project
    Run {
        /// Project directory
        #[arg(short, long, value_name = "DIR")]
        project: PathBuf,

        /// Pipeline file (default: <DIR>/localci.yaml, else the Go pipeline)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        #[command(flatten)]
        push: PushArgs,
    },

    /// List the steps a run would execute
    List {
        /// Project directory
        #[arg(short, long, value_name = "DIR")]
        project: PathBuf,

        /// Pipeline file (default: <DIR>/localci.yaml, else the Go pipeline)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        #[command(flatten)]
        push: PushArgs,
    },

    /// Validate a pipeline file without running it
    Validate {
        /// Path to the pipeline file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Push settings for the built-in Go pipeline
#[derive(clap::Args)]
struct PushArgs {
    /// Remote to push to
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Branch to push
    #[arg(long, default_value = "main")]
    branch: String,

    /// Push timeout in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_PUSH_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    push_timeout: u64,
}

impl PushArgs {
    fn options(&self) -> PushOptions {
        PushOptions {
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            timeout: Duration::from_secs(self.push_timeout),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "localci=debug" } else { "localci=info" };
    let filter = EnvFilter::try_from_env("LOCALCI_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries step results only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run {
            project,
            file,
            push,
        } => run_pipeline(&project, file.as_deref(), &push).await,
        Commands::List {
            project,
            file,
            push,
        } => list_steps(&project, file.as_deref(), &push),
        Commands::Validate { file } => validate(&file),
    }
}

/// Explicit file, then `<project>/localci.yaml`, then the Go preset
fn load_pipeline(project: &Path, file: Option<&Path>, push: &PushArgs) -> anyhow::Result<Pipeline> {
    let path = file
        .map(Path::to_path_buf)
        .or_else(|| PipelineLoader::find_in(project));

    match path {
        Some(path) => {
            tracing::debug!(file = %path.display(), "loading pipeline file");
            let definition = PipelineLoader::load_file(&path)?;
            Ok(definition.build(project)?)
        }
        None => {
            tracing::debug!("no pipeline file; using the Go pipeline");
            Ok(go_pipeline(project, &push.options()))
        }
    }
}

async fn run_pipeline(project: &Path, file: Option<&Path>, push: &PushArgs) -> anyhow::Result<bool> {
    if !project.is_dir() {
        anyhow::bail!("project directory {} does not exist", project.display());
    }
    let project = project
        .canonicalize()
        .with_context(|| format!("resolving project directory {}", project.display()))?;

    let pipeline = load_pipeline(&project, file, push)?;

    let ctx = RunContext::new();
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            tracing::info!("interrupt received; stopping pipeline");
            ctx.cancel();
        });
    }

    let mut out = std::io::stdout();
    match pipeline.run_with_context(&ctx, &mut out).await {
        Ok(report) => {
            tracing::debug!(
                run_id = %report.run_id,
                steps = report.steps.len(),
                elapsed_ms = report.duration.as_millis() as u64,
                "run complete"
            );
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(false)
        }
    }
}

fn list_steps(project: &Path, file: Option<&Path>, push: &PushArgs) -> anyhow::Result<bool> {
    let pipeline = load_pipeline(project, file, push)?;
    for (idx, name) in pipeline.step_names().iter().enumerate() {
        println!("{}. {}", idx + 1, name);
    }
    Ok(true)
}

fn validate(file: &Path) -> anyhow::Result<bool> {
    match PipelineLoader::load_file(file) {
        Ok(definition) => {
            println!(
                "OK: {} ({} steps)",
                definition.name.as_deref().unwrap_or("pipeline"),
                definition.steps.len()
            );
            Ok(true)
        }
        Err(e) => {
            eprintln!("Invalid: {}", e);
            Ok(false)
        }
    }
}
