//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── log_format: LogFormat          # text or json logs on stderr
//! └── command: Command
//!     ├── validate <FILE>
//!     ├── plan <FILE>   + EngineArgs
//!     └── run <FILE>    + EngineArgs + variables
//! ```
//!
//! Engine options can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! nodeflow run workflow.json --mode parallel --var name=world
//!
//! # Or via environment variables
//! NODEFLOW_MODE=parallel NODEFLOW_MAX_RETRIES=0 nodeflow run workflow.json
//! ```

mod engine;
mod variables;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
pub use engine::EngineArgs;
use nodeflow_runtime::definition::Workflow;
use serde::{Deserialize, Serialize};
pub use variables::VariableArgs;

use crate::TRACING_TARGET_CONFIG;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "nodeflow")]
#[command(about = "Validate, plan and run workflow graphs")]
#[command(version)]
pub struct Cli {
    /// Log output format.
    #[arg(long, global = true, env = "NODEFLOW_LOG_FORMAT", value_enum, default_value_t)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Validates a workflow document and prints the result.
    Validate(ValidateArgs),
    /// Prints the execution plan of a workflow document.
    Plan(PlanArgs),
    /// Runs a workflow document with the built-in handlers.
    Run(RunArgs),
}

/// Arguments of `nodeflow validate`.
#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Path to the workflow JSON document.
    pub file: PathBuf,
}

/// Arguments of `nodeflow plan`.
#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Path to the workflow JSON document.
    pub file: PathBuf,

    /// Engine configuration.
    #[clap(flatten)]
    pub engine: EngineArgs,
}

/// Arguments of `nodeflow run`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the workflow JSON document.
    pub file: PathBuf,

    /// Engine configuration.
    #[clap(flatten)]
    pub engine: EngineArgs,

    /// Run variables.
    #[clap(flatten)]
    pub variables: VariableArgs,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its values can
    /// be used as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Validate(_) => Ok(()),
            Command::Plan(args) => args
                .engine
                .validate()
                .context("invalid engine configuration"),
            Command::Run(args) => args
                .engine
                .validate()
                .context("invalid engine configuration"),
        }
    }

    /// Logs build information at debug level.
    pub fn log_build_info(&self) {
        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            log_format = ?self.log_format,
            features = ?Self::enabled_features(),
            "build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Reads and parses a workflow document.
pub fn load_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow file {}", path.display()))?;
    let workflow = Workflow::from_json(&text)
        .with_context(|| format!("failed to parse workflow file {}", path.display()))?;

    tracing::debug!(
        target: TRACING_TARGET_CONFIG,
        path = %path.display(),
        workflow_id = %workflow.id,
        nodes = workflow.nodes.len(),
        edges = workflow.edges.len(),
        "workflow loaded"
    );

    Ok(workflow)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "nodeflow",
            "run",
            "wf.json",
            "--mode",
            "parallel",
            "--max-retries",
            "0",
            "--var",
            "name=world",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.file, PathBuf::from("wf.json"));
        assert_eq!(args.engine.max_retries, 0);
        assert_eq!(args.variables.vars, ["name=world"]);
    }

    #[test]
    fn test_load_workflow() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"nodes": [{{"id": "a", "type": "passthrough"}}], "edges": []}}"#
        )
        .unwrap();

        let workflow = load_workflow(file.path()).unwrap();
        assert_eq!(workflow.nodes.len(), 1);
        assert!(load_workflow(Path::new("/definitely/missing.json")).is_err());
    }
}
