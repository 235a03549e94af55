//! Built-in handlers.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{HandlerContext, NodeHandler};
use crate::error::{NodeError, NodeResult};

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughHandler;

impl PassthroughHandler {
    /// Type tag.
    pub const TYPE: &'static str = "passthrough";
}

#[async_trait]
impl NodeHandler for PassthroughHandler {
    async fn execute(&self, input: Value, _ctx: &HandlerContext) -> NodeResult<Value> {
        Ok(input)
    }
}

/// Merges the configured `values` object over its input.
///
/// Object inputs are shallow-merged (configured keys win); any other input
/// is replaced by `values`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetHandler;

impl SetHandler {
    /// Type tag.
    pub const TYPE: &'static str = "set";
}

#[async_trait]
impl NodeHandler for SetHandler {
    fn required_fields(&self) -> &[&'static str] {
        &["values"]
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        match config.get("values") {
            Some(Value::Object(_)) => Ok(()),
            _ => Err("'values' must be an object".into()),
        }
    }

    async fn execute(&self, input: Value, ctx: &HandlerContext) -> NodeResult<Value> {
        let Some(Value::Object(values)) = ctx.config_field("values") else {
            return Err(NodeError::execution("'values' must be an object"));
        };

        let mut output = match input {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in values {
            output.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(output))
    }
}

/// Sleeps for `duration_ms`, then returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayHandler;

impl DelayHandler {
    /// Type tag.
    pub const TYPE: &'static str = "delay";
}

#[async_trait]
impl NodeHandler for DelayHandler {
    fn required_fields(&self) -> &[&'static str] {
        &["duration_ms"]
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        match config.get("duration_ms").and_then(Value::as_u64) {
            Some(_) => Ok(()),
            None => Err("'duration_ms' must be a non-negative integer".into()),
        }
    }

    async fn execute(&self, input: Value, ctx: &HandlerContext) -> NodeResult<Value> {
        let millis = ctx
            .config_field("duration_ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| NodeError::execution("'duration_ms' must be a non-negative integer"))?;
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(input)
    }
}

/// Always fails with the configured `message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailHandler;

impl FailHandler {
    /// Type tag.
    pub const TYPE: &'static str = "fail";
}

#[async_trait]
impl NodeHandler for FailHandler {
    fn validate(&self, config: &Value) -> Result<(), String> {
        match config.get("message") {
            None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
            Some(_) => Err("'message' must be a string".into()),
        }
    }

    async fn execute(&self, _input: Value, ctx: &HandlerContext) -> NodeResult<Value> {
        let message = ctx
            .config_field("message")
            .and_then(Value::as_str)
            .unwrap_or("node failed");
        Err(NodeError::execution(message))
    }
}
