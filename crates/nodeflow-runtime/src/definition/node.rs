//! Node definition types.

use std::borrow::Borrow;

use derive_builder::Builder;
use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::position::Position;

/// Unique identifier for a node in a workflow graph.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node ID from any string-like value.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Type tag selecting the handler a node is dispatched to.
///
/// The set of node types is open: any string is accepted here, and the
/// engine resolves it against the handler registry at run time.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct NodeType(String);

impl NodeType {
    /// Creates a node type tag.
    #[inline]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        Self(tag.to_owned())
    }
}

impl Borrow<str> for NodeType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Per-node override of the engine's retry and timeout policy.
///
/// Unset fields fall back to the engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePolicy {
    /// Maximum number of retries after the first failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Base retry delay in milliseconds, multiplied by the attempt number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    /// Deadline for a single attempt in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// A workflow node: a typed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    name = "NodeBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with")
)]
pub struct Node {
    /// Unique node ID.
    pub id: NodeId,
    /// Type tag used for handler dispatch.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Type-specific configuration payload.
    #[serde(default = "empty_config")]
    #[builder(default = "empty_config()")]
    pub config: Value,
    /// Disabled nodes are skipped and pass their input through.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    #[builder(default)]
    pub disabled: bool,
    /// Optional retry/timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub retry: Option<NodePolicy>,
    /// Display name of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub name: Option<String>,
    /// Position in the visual editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub position: Option<Position>,
}

fn empty_config() -> Value {
    Value::Object(Default::default())
}

impl Node {
    /// Creates a node with an empty configuration.
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<NodeType>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: empty_config(),
            disabled: false,
            retry: None,
            name: None,
            position: None,
        }
    }

    /// Returns a builder for creating a node.
    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// Sets the configuration payload.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Marks the node as disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Sets a per-node retry/timeout override.
    pub fn with_policy(mut self, policy: NodePolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Returns a configuration field, treating `null` as absent.
    pub fn config_field(&self, field: &str) -> Option<&Value> {
        self.config.get(field).filter(|value| !value.is_null())
    }
}
