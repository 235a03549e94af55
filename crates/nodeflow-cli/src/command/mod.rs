//! Subcommand implementations.
//!
//! Each command prints its result as JSON on stdout and reports whether the
//! process should exit successfully.

mod plan;
mod run;
mod validate;

use nodeflow_runtime::engine::{Engine, EngineConfig};
use nodeflow_runtime::handler::HandlerRegistry;

use crate::config::Command;

/// Executes a subcommand. Returns `false` when the process should exit with failure.
pub async fn execute(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Validate(args) => validate::execute(args),
        Command::Plan(args) => plan::execute(args),
        Command::Run(args) => run::execute(args).await,
    }
}

/// Creates an engine with the built-in handlers.
fn create_engine(config: EngineConfig) -> anyhow::Result<Engine> {
    let engine = Engine::new(config, HandlerRegistry::with_builtins())?;
    Ok(engine)
}

/// Prints a value as pretty JSON on stdout.
fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
