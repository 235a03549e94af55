//! `nodeflow validate`.

use nodeflow_runtime::engine::EngineConfig;

use super::{create_engine, print_json};
use crate::TRACING_TARGET_COMMAND;
use crate::config::{ValidateArgs, load_workflow};

pub(super) fn execute(args: ValidateArgs) -> anyhow::Result<bool> {
    let workflow = load_workflow(&args.file)?;
    let engine = create_engine(EngineConfig::default())?;
    let result = engine.validate(&workflow);

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        valid = result.valid,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "workflow validated"
    );

    print_json(&result)?;
    Ok(result.valid)
}
