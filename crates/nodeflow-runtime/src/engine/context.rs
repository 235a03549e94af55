//! Run-scoped execution state.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, IntoStaticStr};
use uuid::Uuid;

use crate::definition::{NodeId, WorkflowId};
use crate::error::{NodeError, NodeErrorKind, WorkflowError, WorkflowResult};

/// Variables supplied when a run is invoked.
pub type Variables = serde_json::Map<String, Value>;

/// Run lifecycle status.
///
/// `pending -> running -> {completed | failed | cancelled}`. A run may also
/// go straight from `pending` to `failed` or `cancelled`. Terminal states
/// have no outgoing transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, not yet dispatching.
    #[default]
    Pending,
    /// At least one node has been dispatched.
    Running,
    /// Every planned node succeeded or was skipped.
    Completed,
    /// A node exhausted its retries or the run hit a workflow-level error.
    Failed,
    /// Cancellation was observed between scheduling steps.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns whether the state machine allows moving to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }
}

/// Terminal outcome of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    /// Handler produced an output.
    Success,
    /// Handler failed after exhausting its retries.
    Failure,
    /// Node was disabled and passed its input through.
    Skipped,
}

/// Per-node record kept in the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    /// Node this result belongs to.
    pub node_id: NodeId,
    /// Terminal outcome.
    pub status: NodeStatus,
    /// Output payload, absent on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Last error message, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Category of the last error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<NodeErrorKind>,
    /// When the first attempt started.
    pub started_at: Timestamp,
    /// When the node reached its terminal outcome.
    pub finished_at: Timestamp,
    /// Retries actually consumed.
    pub retries: u32,
    /// Whether the node had no registered handler and passed its input through.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl NodeExecutionResult {
    /// Creates a successful result.
    pub fn success(node_id: NodeId, output: Value, started_at: Timestamp, retries: u32) -> Self {
        Self {
            node_id,
            status: NodeStatus::Success,
            output: Some(output),
            error: None,
            error_kind: None,
            started_at,
            finished_at: Timestamp::now(),
            retries,
            fallback: false,
        }
    }

    /// Creates a failed result from the last error.
    pub fn failure(node_id: NodeId, error: &NodeError, started_at: Timestamp, retries: u32) -> Self {
        Self {
            node_id,
            status: NodeStatus::Failure,
            output: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            started_at,
            finished_at: Timestamp::now(),
            retries,
            fallback: false,
        }
    }

    /// Creates a skipped result carrying the pass-through output.
    pub fn skipped(node_id: NodeId, output: Value) -> Self {
        let now = Timestamp::now();
        Self {
            node_id,
            status: NodeStatus::Skipped,
            output: Some(output),
            error: None,
            error_kind: None,
            started_at: now,
            finished_at: now,
            retries: 0,
            fallback: false,
        }
    }

    /// Marks the result as an unknown-type pass-through.
    pub fn with_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Returns whether the node failed.
    pub fn is_failure(&self) -> bool {
        self.status == NodeStatus::Failure
    }
}

/// Entry of the append-only error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Failing node, absent for workflow-level errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Error message.
    pub message: String,
    /// When the error was recorded.
    pub timestamp: Timestamp,
}

/// Mutable state of one workflow run.
///
/// Created by the engine for each invocation and written only by the run's
/// orchestrator. Once the status is terminal the context is returned to the
/// caller and never modified again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    workflow_id: WorkflowId,
    execution_id: Uuid,
    started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<Timestamp>,
    status: ExecutionStatus,
    variables: Variables,
    results: BTreeMap<NodeId, Value>,
    node_results: Vec<NodeExecutionResult>,
    errors: Vec<ErrorEntry>,
}

impl ExecutionContext {
    /// Creates a pending context with a fresh execution ID.
    pub fn new(workflow_id: WorkflowId, variables: Variables) -> Self {
        Self {
            workflow_id,
            execution_id: Uuid::now_v7(),
            started_at: Timestamp::now(),
            finished_at: None,
            status: ExecutionStatus::Pending,
            variables,
            results: BTreeMap::new(),
            node_results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Returns the workflow ID.
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// Returns the execution ID.
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Returns when the run was created.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Returns when the run reached a terminal status.
    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// Returns the run status.
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Returns the variables supplied at invocation.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Returns the node ID to output mapping.
    pub fn results(&self) -> &BTreeMap<NodeId, Value> {
        &self.results
    }

    /// Returns the output of a node.
    pub fn result(&self, node_id: &str) -> Option<&Value> {
        self.results.get(node_id)
    }

    /// Returns per-node results in completion order.
    pub fn node_results(&self) -> &[NodeExecutionResult] {
        &self.node_results
    }

    /// Returns the result record of a node.
    pub fn node_result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.node_results
            .iter()
            .find(|result| result.node_id.as_str() == node_id)
    }

    /// Returns the error log.
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Returns how many nodes finished with success or skipped.
    pub fn completed_count(&self) -> usize {
        self.node_results
            .iter()
            .filter(|result| !result.is_failure())
            .count()
    }

    /// Moves the run to a new status.
    pub(crate) fn transition(&mut self, next: ExecutionStatus) -> WorkflowResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Timestamp::now());
        }
        Ok(())
    }

    /// Records a node's terminal outcome.
    ///
    /// The results mapping only gains a key for successful or skipped nodes.
    pub(crate) fn record(&mut self, result: NodeExecutionResult) {
        if let Some(output) = result.output.as_ref().filter(|_| !result.is_failure()) {
            self.results.insert(result.node_id.clone(), output.clone());
        }
        self.node_results.push(result);
    }

    /// Appends an entry to the error log.
    pub(crate) fn log_error(&mut self, node_id: Option<NodeId>, message: impl Into<String>) {
        self.errors.push(ErrorEntry {
            node_id,
            message: message.into(),
            timestamp: Timestamp::now(),
        });
    }

    /// Maps the terminal status to a result.
    ///
    /// `completed` is `Ok`, `failed` becomes [`WorkflowError::NodeFailed`]
    /// for the first logged node error, and `cancelled` becomes
    /// [`WorkflowError::Cancelled`].
    pub fn ensure_completed(&self) -> WorkflowResult<()> {
        match self.status {
            ExecutionStatus::Completed => Ok(()),
            ExecutionStatus::Cancelled => Err(WorkflowError::Cancelled),
            ExecutionStatus::Failed => {
                let entry = self.errors.first();
                match entry.and_then(|e| e.node_id.clone().map(|id| (id, e))) {
                    Some((node_id, entry)) => Err(WorkflowError::NodeFailed {
                        node_id,
                        message: entry.message.clone(),
                    }),
                    None => Err(WorkflowError::Internal(
                        entry
                            .map(|e| e.message.clone())
                            .unwrap_or_else(|| "workflow failed".into()),
                    )),
                }
            }
            status => Err(WorkflowError::Internal(format!(
                "run has not finished (status {status})"
            ))),
        }
    }
}
