//! Type tag to handler registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::{
    DelayHandler, FailHandler, FnHandler, HandlerContext, NodeHandler, PassthroughHandler,
    SetHandler,
};
use crate::definition::NodeType;
use crate::error::NodeResult;
use crate::validation::RequiredFields;

/// Registry of node handlers keyed by type tag.
///
/// Built once by the host and handed to the engine at construction. Lookups
/// for unregistered tags return `None`; the engine treats those nodes as
/// pass-through.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<NodeType, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in handlers registered.
    ///
    /// | Tag           | Handler                |
    /// |---------------|------------------------|
    /// | `passthrough` | [`PassthroughHandler`] |
    /// | `set`         | [`SetHandler`]         |
    /// | `delay`       | [`DelayHandler`]       |
    /// | `fail`        | [`FailHandler`]        |
    pub fn with_builtins() -> Self {
        Self::new()
            .with(PassthroughHandler::TYPE, PassthroughHandler)
            .with(SetHandler::TYPE, SetHandler)
            .with(DelayHandler::TYPE, DelayHandler)
            .with(FailHandler::TYPE, FailHandler)
    }

    /// Registers a handler, replacing any handler previously bound to the tag.
    pub fn register(&mut self, node_type: impl Into<NodeType>, handler: impl NodeHandler) {
        self.register_arc(node_type, Arc::new(handler));
    }

    /// Registers an already shared handler.
    pub fn register_arc(&mut self, node_type: impl Into<NodeType>, handler: Arc<dyn NodeHandler>) {
        let node_type = node_type.into();
        if self.handlers.insert(node_type.clone(), handler).is_some() {
            tracing::debug!(
                target: crate::TRACING_TARGET,
                node_type = %node_type,
                "handler replaced"
            );
        }
    }

    /// Registers an async closure as a handler.
    pub fn register_fn<F, Fut>(&mut self, node_type: impl Into<NodeType>, func: F)
    where
        F: Fn(Value, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult<Value>> + Send + 'static,
    {
        self.register(node_type, FnHandler::new(func));
    }

    /// Registers a handler and returns the registry, for chaining.
    pub fn with(mut self, node_type: impl Into<NodeType>, handler: impl NodeHandler) -> Self {
        self.register(node_type, handler);
        self
    }

    /// Returns the handler bound to a type tag.
    pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(node_type).cloned()
    }

    /// Returns whether a type tag has a handler.
    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Returns the registered type tags, sorted.
    pub fn types(&self) -> Vec<&NodeType> {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Builds the required-field table declared by the registered handlers.
    pub fn required_fields(&self) -> RequiredFields {
        let mut table = RequiredFields::new();
        for (node_type, handler) in &self.handlers {
            let fields = handler.required_fields();
            if !fields.is_empty() {
                table.require(node_type.clone(), fields.iter().copied());
            }
        }
        table
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.types())
            .finish()
    }
}
