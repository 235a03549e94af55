//! Edge types for connecting nodes in a workflow graph.

use derive_builder::Builder;
use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};

use super::NodeId;

/// Unique identifier for an edge in a workflow graph.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    /// Creates an edge ID from any string-like value.
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

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A directed dependency from one node's output to another node's input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Builder)]
#[builder(
    name = "EdgeBuilder",
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct Edge {
    /// Unique edge ID.
    pub id: EdgeId,
    /// Source (upstream) node ID.
    pub source: NodeId,
    /// Target (downstream) node ID.
    pub target: NodeId,
}

impl EdgeBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.source.is_none() {
            return Err("source is required".into());
        }
        if self.target.is_none() {
            return Err("target is required".into());
        }
        Ok(())
    }
}

impl Edge {
    /// Creates a new edge between two nodes.
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Creates an edge whose ID is derived from its endpoints (`source->target`).
    pub fn between(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        let id = EdgeId::new(format!("{source}->{target}"));
        Self { id, source, target }
    }

    /// Returns a builder for creating an edge.
    pub fn builder() -> EdgeBuilder {
        EdgeBuilder::default()
    }
}
