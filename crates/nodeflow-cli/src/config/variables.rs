//! Run variables from the command line and files.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result as AnyhowResult, anyhow};
use clap::Args;
use nodeflow_runtime::engine::Variables;
use serde_json::Value;

/// Variables passed to the root nodes of a run.
///
/// `--vars-file` is loaded first; `--var` entries override its keys.
#[derive(Debug, Clone, Default, Args)]
pub struct VariableArgs {
    /// Variable as `KEY=VALUE`; VALUE is parsed as JSON, falling back to a string.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// JSON file containing an object of variables.
    #[arg(long, env = "NODEFLOW_VARS_FILE")]
    pub vars_file: Option<PathBuf>,
}

impl VariableArgs {
    /// Collects the variables.
    pub fn load(&self) -> AnyhowResult<Variables> {
        let mut variables = match &self.vars_file {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read variables file {}", path.display()))?;
                match serde_json::from_str::<Value>(&text)
                    .with_context(|| format!("failed to parse variables file {}", path.display()))?
                {
                    Value::Object(map) => map,
                    _ => return Err(anyhow!("variables file {} must contain a JSON object", path.display())),
                }
            }
            None => Variables::new(),
        };

        for entry in &self.vars {
            let (key, value) = parse_var(entry)?;
            variables.insert(key, value);
        }

        Ok(variables)
    }
}

fn parse_var(entry: &str) -> AnyhowResult<(String, Value)> {
    let (key, raw) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("variable '{entry}' must have the form KEY=VALUE"))?;
    if key.is_empty() {
        return Err(anyhow!("variable '{entry}' has an empty key"));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((key.to_owned(), value))
}
