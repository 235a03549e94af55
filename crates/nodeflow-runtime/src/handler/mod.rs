//! Node handlers and the type-tag registry.
//!
//! A handler implements the work for one node type. Handlers are looked up
//! through a [`HandlerRegistry`] supplied when the engine is constructed, so
//! adding a node type means registering a handler rather than touching the
//! engine.

mod builtin;
mod registry;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
pub use builtin::{DelayHandler, FailHandler, PassthroughHandler, SetHandler};
pub use registry::HandlerRegistry;
use serde_json::Value;
use uuid::Uuid;

use crate::definition::{Node, NodeId, NodeType};
use crate::error::NodeResult;

/// Per-attempt information passed to a handler.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    execution_id: Uuid,
    node: Arc<Node>,
    attempt: u32,
}

impl HandlerContext {
    /// Creates a context for one attempt of a node.
    pub fn new(execution_id: Uuid, node: Arc<Node>, attempt: u32) -> Self {
        Self {
            execution_id,
            node,
            attempt,
        }
    }

    /// Returns the ID of the run this attempt belongs to.
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Returns the node being executed.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Returns the node ID.
    pub fn node_id(&self) -> &NodeId {
        &self.node.id
    }

    /// Returns the node type tag.
    pub fn node_type(&self) -> &NodeType {
        &self.node.node_type
    }

    /// Returns the node configuration payload.
    pub fn config(&self) -> &Value {
        &self.node.config
    }

    /// Returns a configuration field, treating `null` as absent.
    pub fn config_field(&self, field: &str) -> Option<&Value> {
        self.node.config_field(field)
    }

    /// Returns the attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Capability implemented by every node type.
#[async_trait]
pub trait NodeHandler: Send + Sync + 'static {
    /// Configuration fields that must be present (and non-null).
    fn required_fields(&self) -> &[&'static str] {
        &[]
    }

    /// Checks a node configuration before any run is scheduled.
    ///
    /// Called only when every required field is present.
    fn validate(&self, _config: &Value) -> Result<(), String> {
        Ok(())
    }

    /// Performs the node's work on its resolved input.
    async fn execute(&self, input: Value, ctx: &HandlerContext) -> NodeResult<Value>;
}

/// Adapter turning an async closure into a [`NodeHandler`].
pub struct FnHandler<F> {
    func: F,
    required_fields: Vec<&'static str>,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Value, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = NodeResult<Value>> + Send + 'static,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self {
            func,
            required_fields: Vec::new(),
        }
    }

    /// Declares configuration fields the closure relies on.
    pub fn with_required_fields(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.required_fields = fields.into_iter().collect();
        self
    }
}

#[async_trait]
impl<F, Fut> NodeHandler for FnHandler<F>
where
    F: Fn(Value, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = NodeResult<Value>> + Send + 'static,
{
    fn required_fields(&self) -> &[&'static str] {
        &self.required_fields
    }

    async fn execute(&self, input: Value, ctx: &HandlerContext) -> NodeResult<Value> {
        (self.func)(input, ctx.clone()).await
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler")
            .field("required_fields", &self.required_fields)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_fn_handler_receives_context() {
        let handler = FnHandler::new(|input: Value, ctx: HandlerContext| async move {
            Ok(json!({"node": ctx.node_id().as_str(), "attempt": ctx.attempt(), "input": input}))
        })
        .with_required_fields(["url"]);

        let node = Arc::new(Node::new("n1", "custom"));
        let ctx = HandlerContext::new(Uuid::now_v7(), node, 2);
        let output = handler.execute(json!(7), &ctx).await.unwrap();

        assert_eq!(output, json!({"node": "n1", "attempt": 2, "input": 7}));
        assert_eq!(handler.required_fields(), ["url"]);
    }
}
