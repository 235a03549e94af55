//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use nodeflow_runtime::prelude::*;
//! ```

pub use crate::definition::{Edge, Node, NodeId, NodePolicy, NodeType, Workflow, WorkflowId};
pub use crate::engine::{
    Engine, EngineConfig, ExecutionContext, ExecutionObserver, ExecutionStatus, NodePhase,
    RunOptions, Variables,
};
pub use crate::error::{NodeError, NodeResult, WorkflowError, WorkflowResult};
pub use crate::graph::{ExecutionMode, ExecutionPlan};
pub use crate::handler::{HandlerContext, HandlerRegistry, NodeHandler};
pub use crate::validation::{ValidationResult, Validator};
