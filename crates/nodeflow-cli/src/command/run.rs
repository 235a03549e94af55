//! `nodeflow run`.

use std::sync::Arc;

use anyhow::Context;
use nodeflow_runtime::WorkflowError;
use nodeflow_runtime::engine::{ExecutionStatus, RunOptions, TracingObserver};
use tokio_util::sync::CancellationToken;

use super::{create_engine, print_json};
use crate::TRACING_TARGET_COMMAND;
use crate::config::{RunArgs, load_workflow};
use crate::shutdown::cancel_on_signal;

pub(super) async fn execute(args: RunArgs) -> anyhow::Result<bool> {
    args.engine.log();

    let workflow = load_workflow(&args.file)?;
    let variables = args.variables.load().context("invalid run variables")?;
    let engine = create_engine(args.engine.to_engine_config()?)?;

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(cancel.clone()));

    let options = RunOptions::new()
        .with_variables(variables)
        .with_mode(args.engine.mode)
        .with_observer(Arc::new(TracingObserver))
        .with_cancellation(cancel);

    let outcome = engine.execute_with(&workflow, options).await;
    signals.abort();

    let ctx = match outcome {
        Ok(ctx) => ctx,
        Err(WorkflowError::InvalidWorkflow(result)) => {
            tracing::error!(
                target: TRACING_TARGET_COMMAND,
                errors = result.errors.len(),
                "workflow is invalid, nothing was run"
            );
            print_json(&result)?;
            return Ok(false);
        }
        Err(error) => return Err(error).context("workflow execution failed"),
    };

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        execution_id = %ctx.execution_id(),
        status = %ctx.status(),
        "run finished"
    );

    print_json(&ctx)?;
    Ok(ctx.status() == ExecutionStatus::Completed)
}
