//! `nodeflow plan`.

use nodeflow_runtime::WorkflowError;

use super::{create_engine, print_json};
use crate::TRACING_TARGET_COMMAND;
use crate::config::{PlanArgs, load_workflow};

pub(super) fn execute(args: PlanArgs) -> anyhow::Result<bool> {
    let workflow = load_workflow(&args.file)?;
    let engine = create_engine(args.engine.to_engine_config()?)?;

    match engine.plan(&workflow, Some(args.engine.mode)) {
        Ok(plan) => {
            tracing::info!(
                target: TRACING_TARGET_COMMAND,
                mode = %plan.mode(),
                nodes = plan.node_count(),
                "execution plan computed"
            );
            print_json(&plan)?;
            Ok(true)
        }
        Err(WorkflowError::InvalidWorkflow(result)) => {
            tracing::error!(
                target: TRACING_TARGET_COMMAND,
                errors = result.errors.len(),
                "workflow is invalid"
            );
            print_json(&result)?;
            Ok(false)
        }
        Err(error) => Err(error.into()),
    }
}
