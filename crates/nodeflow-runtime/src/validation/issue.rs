//! Validation issues and results.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, IntoStaticStr};

use crate::definition::{EdgeId, NodeId};
use crate::error::{WorkflowError, WorkflowResult};

/// Stable code identifying what a validation issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueKind {
    /// Workflow declares no nodes.
    EmptyWorkflow,
    /// Edge references an undeclared node.
    DanglingEdge,
    /// Node has no incident edges in a multi-node workflow.
    IsolatedNode,
    /// Graph contains a directed cycle.
    Cycle,
    /// Node configuration lacks a required field.
    MissingField,
    /// Node ID declared more than once.
    DuplicateNodeId,
    /// Edge ID declared more than once.
    DuplicateEdgeId,
    /// Handler rejected the node configuration.
    InvalidConfig,
    /// No handler is registered for the node type.
    UnknownType,
}

/// A single validation error or warning, optionally tagged with a node or edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Issue code.
    pub kind: IssueKind,
    /// Human-readable description.
    pub message: String,
    /// Node the issue is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Edge the issue is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<EdgeId>,
}

impl ValidationIssue {
    /// Creates an untagged issue.
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }

    /// Tags the issue with a node.
    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Tags the issue with an edge.
    pub fn with_edge(mut self, edge_id: EdgeId) -> Self {
        self.edge_id = Some(edge_id);
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Outcome of validating a workflow.
///
/// Errors block execution; warnings are advisory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the workflow may be scheduled.
    pub valid: bool,
    /// Blocking errors, in check order.
    pub errors: Vec<ValidationIssue>,
    /// Non-blocking warnings, in check order.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Builds a result from collected issues.
    pub fn new(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Returns whether the workflow may be scheduled.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns errors of the given kind.
    pub fn errors_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |issue| issue.kind == kind)
    }

    /// Returns warnings of the given kind.
    pub fn warnings_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.warnings.iter().filter(move |issue| issue.kind == kind)
    }

    /// Converts an invalid result into [`WorkflowError::InvalidWorkflow`].
    pub fn into_result(self) -> WorkflowResult<Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(WorkflowError::InvalidWorkflow(self))
        }
    }
}
