//! Deterministic execution ordering (Kahn's algorithm).

use std::collections::VecDeque;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::WorkflowGraph;
use crate::definition::NodeId;
use crate::error::{WorkflowError, WorkflowResult};

/// Tracing target for scheduling.
const TRACING_TARGET: &str = "nodeflow_runtime::schedule";

/// How the nodes of a run are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExecutionMode {
    /// One node at a time, in a single global order.
    #[default]
    Sequential,
    /// Ready groups, each launched concurrently and joined before the next.
    Parallel,
}

/// A fixed execution schedule computed once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "schedule", rename_all = "snake_case")]
pub enum ExecutionPlan {
    /// Global order for sequential runs.
    Sequential(Vec<NodeId>),
    /// Ordered ready groups for parallel runs.
    Parallel(Vec<Vec<NodeId>>),
}

impl ExecutionPlan {
    /// Returns the mode this plan was computed for.
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Sequential(_) => ExecutionMode::Sequential,
            Self::Parallel(_) => ExecutionMode::Parallel,
        }
    }

    /// Returns the total number of planned nodes.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Sequential(order) => order.len(),
            Self::Parallel(groups) => groups.iter().map(Vec::len).sum(),
        }
    }

    /// Returns the plan flattened into a single order.
    pub fn order(&self) -> Vec<&NodeId> {
        match self {
            Self::Sequential(order) => order.iter().collect(),
            Self::Parallel(groups) => groups.iter().flatten().collect(),
        }
    }

    /// Returns the plan as groups; a sequential plan has one node per group.
    pub fn groups(&self) -> Vec<Vec<&NodeId>> {
        match self {
            Self::Sequential(order) => order.iter().map(|id| vec![id]).collect(),
            Self::Parallel(groups) => groups.iter().map(|g| g.iter().collect()).collect(),
        }
    }
}

/// Computes execution plans for validated, acyclic graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Computes the plan for the given mode.
    pub fn plan(graph: &WorkflowGraph<'_>, mode: ExecutionMode) -> WorkflowResult<ExecutionPlan> {
        let plan = match mode {
            ExecutionMode::Sequential => ExecutionPlan::Sequential(Self::sequential(graph)?),
            ExecutionMode::Parallel => ExecutionPlan::Parallel(Self::parallel(graph)?),
        };

        tracing::debug!(
            target: TRACING_TARGET,
            mode = %mode,
            node_count = plan.node_count(),
            "execution plan computed"
        );

        Ok(plan)
    }

    /// Single global order.
    ///
    /// Ready nodes are dequeued first-in first-out. Nodes unlocked by the same
    /// removal are enqueued in declaration order.
    pub fn sequential(graph: &WorkflowGraph<'_>) -> WorkflowResult<Vec<NodeId>> {
        let mut in_degree: Vec<usize> = graph.indices().map(|i| graph.in_degree(i)).collect();
        let mut queue: VecDeque<NodeIndex> = graph
            .indices()
            .filter(|i| in_degree[i.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(graph.node_count());
        while let Some(index) = queue.pop_front() {
            order.push(graph.node_id(index).clone());

            // successors() is already in declaration order
            for next in graph.successors(index) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    queue.push_back(next);
                }
            }
        }

        Self::ensure_complete(graph, order.len())?;
        Ok(order)
    }

    /// Ordered ready groups.
    ///
    /// Readiness is recomputed from the set of nodes in earlier groups at every
    /// wave boundary, so each group holds exactly the nodes whose upstream
    /// nodes have all been scheduled before it.
    pub fn parallel(graph: &WorkflowGraph<'_>) -> WorkflowResult<Vec<Vec<NodeId>>> {
        let predecessors: Vec<Vec<NodeIndex>> =
            graph.indices().map(|i| graph.predecessors(i)).collect();
        let mut done = vec![false; graph.node_count()];
        let mut scheduled = 0;
        let mut groups = Vec::new();

        loop {
            let wave: Vec<NodeIndex> = graph
                .indices()
                .filter(|i| !done[i.index()])
                .filter(|i| predecessors[i.index()].iter().all(|p| done[p.index()]))
                .collect();

            if wave.is_empty() {
                break;
            }

            for index in &wave {
                done[index.index()] = true;
            }
            scheduled += wave.len();
            groups.push(wave.into_iter().map(|i| graph.node_id(i).clone()).collect());
        }

        Self::ensure_complete(graph, scheduled)?;
        Ok(groups)
    }

    fn ensure_complete(graph: &WorkflowGraph<'_>, scheduled: usize) -> WorkflowResult<()> {
        if scheduled == graph.node_count() {
            return Ok(());
        }
        Err(WorkflowError::Internal(format!(
            "cannot schedule {} of {} nodes: graph contains a cycle",
            graph.node_count() - scheduled,
            graph.node_count()
        )))
    }
}
