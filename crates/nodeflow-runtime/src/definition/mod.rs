//! Workflow definition types.
//!
//! This module contains the serializable document a host application hands
//! to the engine:
//! - [`Workflow`]: nodes, edges, and a format version
//! - [`Node`]: a typed unit of work with its configuration payload
//! - [`Edge`]: a directed dependency between two nodes
//!
//! Definitions are read-only to the engine. Validation and scheduling never
//! mutate them.

use std::str::FromStr;

use derive_more::{Debug, Display, From, Into};
use semver::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod edge;
mod metadata;
mod node;
mod position;

pub use edge::{Edge, EdgeBuilder, EdgeId};
pub use metadata::WorkflowMetadata;
pub use node::{Node, NodeBuilder, NodeId, NodePolicy, NodeType};
pub use position::Position;

use crate::error::WorkflowResult;

/// Unique identifier for a workflow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Creates a new random workflow ID.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[inline]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Serializable workflow document: `{id, version, nodes, edges, metadata}`.
///
/// Node order is significant: it is the declaration order the scheduler
/// uses to break ties between nodes that become ready together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow ID, generated when absent from the document.
    #[serde(default)]
    pub id: WorkflowId,
    /// Document format version.
    #[serde(default = "default_version")]
    pub version: Version,
    /// Nodes in declaration order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges connecting nodes.
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Workflow metadata.
    #[serde(default)]
    pub metadata: WorkflowMetadata,
}

fn default_version() -> Version {
    Version::new(1, 0, 0)
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            id: WorkflowId::new(),
            version: default_version(),
            nodes: Vec::new(),
            edges: Vec::new(),
            metadata: WorkflowMetadata::default(),
        }
    }
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node, keeping declaration order.
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Appends an edge.
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Sets the workflow metadata.
    pub fn with_metadata(mut self, metadata: WorkflowMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Parses a workflow from a JSON document.
    pub fn from_json(json: &str) -> WorkflowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the workflow to a pretty-printed JSON document.
    pub fn to_json(&self) -> WorkflowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_definition_new() {
        let def = Workflow::default();
        assert!(def.nodes.is_empty());
        assert!(def.edges.is_empty());
        assert_eq!(def.version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_workflow_from_json_keeps_order() {
        let json = r#"{
            "version": "2.1.0",
            "nodes": [
                {"id": "c", "type": "passthrough"},
                {"id": "a", "type": "passthrough"},
                {"id": "b", "type": "passthrough"}
            ],
            "edges": [{"id": "e1", "source": "c", "target": "a"}]
        }"#;
        let def = Workflow::from_json(json).unwrap();
        let ids: Vec<_> = def.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(def.version, Version::new(2, 1, 0));
        assert_eq!(def.edges[0].source.as_str(), "c");
    }

    #[test]
    fn test_workflow_json_roundtrip_preserves_id() {
        let def = Workflow::new().with_node(Node::new("a", "passthrough"));
        let parsed = Workflow::from_json(&def.to_json().unwrap()).unwrap();
        assert_eq!(parsed.id, def.id);
        assert_eq!(parsed, def);
    }

    #[test]
    fn test_workflow_from_json_rejects_garbage() {
        assert!(Workflow::from_json("{nodes: 1}").is_err());
    }
}
