//! Graph view and scheduling.
//!
//! - [`WorkflowGraph`]: petgraph-backed, declaration-ordered view of a workflow
//! - [`Scheduler`]: Kahn's algorithm producing an [`ExecutionPlan`]
//! - [`ExecutionMode`]: sequential order or parallel ready groups

#[allow(clippy::module_inception)]
mod graph;
mod schedule;

pub use graph::WorkflowGraph;
pub use schedule::{ExecutionMode, ExecutionPlan, Scheduler};
