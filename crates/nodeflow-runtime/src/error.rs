//! Workflow error types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error;

use crate::definition::NodeId;
use crate::engine::ExecutionStatus;
use crate::validation::ValidationResult;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Result type returned by node handlers.
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Workflow failed validation and was not scheduled.
    #[error("invalid workflow: {} error(s)", .0.errors.len())]
    InvalidWorkflow(ValidationResult),

    /// Engine configuration is invalid.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    /// Node execution failed after its retry budget was exhausted.
    #[error("node {node_id} failed: {message}")]
    NodeFailed {
        /// ID of the failed node.
        node_id: NodeId,
        /// Error message.
        message: String,
    },

    /// Workflow execution was cancelled.
    #[error("workflow execution cancelled")]
    Cancelled,

    /// Run status was moved along an edge the state machine does not allow.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ExecutionStatus,
        /// Requested status.
        to: ExecutionStatus,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Categories of node failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(AsRefStr, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeErrorKind {
    /// Handler reported a failure.
    Execution,
    /// Handler did not settle before its deadline.
    Timeout,
    /// Handler rejected its resolved input.
    InvalidInput,
    /// Any other error surfaced by the handler.
    Other,
}

/// Errors reported by (or on behalf of) a single node handler.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Handler-reported failure.
    #[error("{0}")]
    Execution(String),

    /// Handler exceeded its deadline.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Handler rejected its input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Wrapped error from a handler dependency.
    #[error(transparent)]
    Other(#[from] BoxedError),
}

impl NodeError {
    /// Creates an execution error from any message.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Creates an invalid input error from any message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns the error kind.
    pub fn kind(&self) -> NodeErrorKind {
        match self {
            Self::Execution(_) => NodeErrorKind::Execution,
            Self::Timeout(_) => NodeErrorKind::Timeout,
            Self::InvalidInput(_) => NodeErrorKind::InvalidInput,
            Self::Other(_) => NodeErrorKind::Other,
        }
    }

    /// Returns whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Other(Box::new(error))
    }
}
