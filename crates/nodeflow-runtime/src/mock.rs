//! Mock handlers and observers for testing.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! nodeflow-runtime = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nodeflow_runtime::handler::HandlerRegistry;
//! use nodeflow_runtime::mock::ScriptedHandler;
//!
//! let flaky = ScriptedHandler::failing(2);
//! let registry = HandlerRegistry::new().with("flaky", flaky.clone());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::definition::NodeId;
use crate::engine::{ExecutionObserver, NodePhase};
use crate::error::{NodeError, NodeResult};
use crate::handler::{HandlerContext, NodeHandler};

/// Handler that fails a fixed number of times, then returns its input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHandler {
    failures: Option<u32>,
    calls: Arc<AtomicU32>,
}

impl ScriptedHandler {
    /// Fails the first `failures` invocations, then succeeds.
    pub fn failing(failures: u32) -> Self {
        Self {
            failures: Some(failures),
            calls: Arc::default(),
        }
    }

    /// Fails every invocation.
    pub fn always_failing() -> Self {
        Self {
            failures: None,
            calls: Arc::default(),
        }
    }

    /// Returns the number of invocations so far, across clones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeHandler for ScriptedHandler {
    async fn execute(&self, input: Value, ctx: &HandlerContext) -> NodeResult<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.failures {
            Some(failures) if call > failures => Ok(input),
            _ => Err(NodeError::execution(format!(
                "scripted failure {call} of node {}",
                ctx.node_id()
            ))),
        }
    }
}

/// Handler whose invocations never settle.
#[derive(Debug, Clone, Default)]
pub struct HangingHandler {
    calls: Arc<AtomicU32>,
}

impl HangingHandler {
    /// Creates a hanging handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of invocations so far, across clones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeHandler for HangingHandler {
    async fn execute(&self, _input: Value, _ctx: &HandlerContext) -> NodeResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Handler recording start/end events and the input each node received.
///
/// Outputs the node ID as a JSON string.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    delay: Duration,
    events: Arc<Mutex<Vec<String>>>,
    inputs: Arc<Mutex<HashMap<String, Value>>>,
}

impl RecordingHandler {
    /// Creates a recording handler that returns immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` between the start and end events.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns events such as `start:a` and `end:a`, in order.
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the input a node received on its last invocation.
    pub fn input_of(&self, node_id: &str) -> Option<Value> {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_id)
            .cloned()
    }

    fn push(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[async_trait]
impl NodeHandler for RecordingHandler {
    async fn execute(&self, input: Value, ctx: &HandlerContext) -> NodeResult<Value> {
        let id = ctx.node_id().as_str();
        self.push(format!("start:{id}"));
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_owned(), input);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.push(format!("end:{id}"));
        Ok(Value::String(id.to_owned()))
    }
}

/// Handler that panics on every invocation.
#[derive(Debug, Clone, Default)]
pub struct PanickingHandler {
    calls: Arc<AtomicU32>,
}

impl PanickingHandler {
    /// Creates a panicking handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of invocations so far, across clones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeHandler for PanickingHandler {
    async fn execute(&self, _input: Value, ctx: &HandlerContext) -> NodeResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("handler for node {} panicked", ctx.node_id());
    }
}

/// Observer recording every progress and error callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    phases: Mutex<Vec<(NodeId, NodePhase)>>,
    errors: Mutex<Vec<(NodeId, String)>>,
}

impl RecordingObserver {
    /// Creates an empty recording observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded progress callbacks, in call order.
    pub fn phases(&self) -> Vec<(NodeId, NodePhase)> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the phases recorded for one node.
    pub fn phases_of(&self, node_id: &str) -> Vec<NodePhase> {
        self.phases()
            .into_iter()
            .filter(|(id, _)| id.as_str() == node_id)
            .map(|(_, phase)| phase)
            .collect()
    }

    /// Returns the recorded error callbacks, in call order.
    pub fn errors(&self) -> Vec<(NodeId, String)> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn on_progress(&self, node_id: &NodeId, phase: NodePhase) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((node_id.clone(), phase));
    }

    fn on_error(&self, node_id: &NodeId, error: &str) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((node_id.clone(), error.to_owned()));
    }
}
