//! Workflow execution engine.
//!
//! This module provides the runtime for executing workflows:
//! - [`Engine`]: validates, schedules and runs workflows
//! - [`EngineConfig`]: retry, timeout, mode and concurrency options
//! - [`ExecutionContext`]: run-scoped state returned to the caller
//! - [`RetryPolicy`]: per-node retry budget, backoff and deadline
//! - [`ExecutionObserver`]: progress and error hooks

mod config;
mod context;
mod executor;
mod observer;
mod retry;

pub use config::{EngineConfig, EngineConfigBuilder, EngineConfigBuilderError};
pub use context::{
    ErrorEntry, ExecutionContext, ExecutionStatus, NodeExecutionResult, NodeStatus, Variables,
};
pub use executor::{Engine, RunOptions};
pub use observer::{CallbackObserver, ExecutionObserver, NodePhase, NoopObserver, TracingObserver};
pub use retry::{RetryPolicy, SupervisedOutcome};
