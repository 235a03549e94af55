#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;
mod shutdown;
mod telemetry;

use std::process;

use anyhow::Context;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_COMMAND: &str = "nodeflow_cli::command";
pub const TRACING_TARGET_SHUTDOWN: &str = "nodeflow_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "nodeflow_cli::config";

#[tokio::main]
async fn main() {
    let error = match run().await {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(error) => error,
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<bool> {
    let cli = Cli::init();

    telemetry::init_tracing(cli.log_format)?;
    cli.log_build_info();
    cli.validate().context("invalid configuration")?;

    command::execute(cli.command).await
}
