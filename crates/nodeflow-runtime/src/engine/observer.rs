//! Progress and error hooks for host collaborators.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, IntoStaticStr};

use crate::definition::NodeId;

/// Tracing target for observer events.
const TRACING_TARGET: &str = "nodeflow_runtime::observer";

/// Node lifecycle phase reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodePhase {
    /// First attempt is about to be dispatched.
    Started,
    /// Node produced an output.
    Completed,
    /// Node failed after exhausting its retries.
    Failed,
    /// Node was disabled and passed its input through.
    Skipped,
}

/// Hooks invoked by the engine while a run progresses.
///
/// Hooks are called from the run's orchestrator, in dispatch and completion
/// order. They must not block.
pub trait ExecutionObserver: Send + Sync {
    /// Called with each phase change of a node.
    fn on_progress(&self, _node_id: &NodeId, _phase: NodePhase) {}

    /// Called once per node that fails terminally.
    fn on_error(&self, _node_id: &NodeId, _error: &str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Observer that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn on_progress(&self, node_id: &NodeId, phase: NodePhase) {
        tracing::info!(
            target: TRACING_TARGET,
            node_id = %node_id,
            phase = %phase,
            "node progress"
        );
    }

    fn on_error(&self, node_id: &NodeId, error: &str) {
        tracing::error!(
            target: TRACING_TARGET,
            node_id = %node_id,
            error = %error,
            "node failed"
        );
    }
}

/// Observer built from closures.
pub struct CallbackObserver {
    on_progress: Box<dyn Fn(&NodeId, NodePhase) + Send + Sync>,
    on_error: Box<dyn Fn(&NodeId, &str) + Send + Sync>,
}

impl CallbackObserver {
    /// Creates an observer that ignores every event until callbacks are set.
    pub fn new() -> Self {
        Self {
            on_progress: Box::new(|_, _| {}),
            on_error: Box::new(|_, _| {}),
        }
    }

    /// Sets the progress callback.
    pub fn with_progress(
        mut self,
        callback: impl Fn(&NodeId, NodePhase) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Box::new(callback);
        self
    }

    /// Sets the error callback.
    pub fn with_error(mut self, callback: impl Fn(&NodeId, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(callback);
        self
    }
}

impl Default for CallbackObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackObserver").finish_non_exhaustive()
    }
}

impl ExecutionObserver for CallbackObserver {
    fn on_progress(&self, node_id: &NodeId, phase: NodePhase) {
        (self.on_progress)(node_id, phase);
    }

    fn on_error(&self, node_id: &NodeId, error: &str) {
        (self.on_error)(node_id, error);
    }
}
