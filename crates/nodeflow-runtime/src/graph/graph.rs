//! Indexed graph view over a workflow definition.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::definition::{Edge, Node, NodeId, Workflow};

/// Read-only graph view of a [`Workflow`].
///
/// Internally uses petgraph's `DiGraph`. Node indices follow declaration
/// order, so comparing two indices compares declaration positions. Edges
/// whose endpoints are not declared are kept aside as dangling instead of
/// being added to the graph; when a node ID is declared twice, the first
/// declaration wins.
#[derive(Debug, Clone)]
pub struct WorkflowGraph<'a> {
    workflow: &'a Workflow,
    /// Node weights are positions in `workflow.nodes`, edge weights are
    /// positions in `workflow.edges`.
    graph: DiGraph<usize, usize>,
    /// Mapping from NodeId to petgraph's NodeIndex.
    node_indices: HashMap<&'a str, NodeIndex>,
    /// Positions of edges referencing undeclared nodes.
    dangling: Vec<usize>,
}

impl<'a> WorkflowGraph<'a> {
    /// Builds the graph view of a workflow.
    pub fn new(workflow: &'a Workflow) -> Self {
        let mut graph = DiGraph::with_capacity(workflow.nodes.len(), workflow.edges.len());
        let mut node_indices = HashMap::with_capacity(workflow.nodes.len());

        for (position, node) in workflow.nodes.iter().enumerate() {
            if node_indices.contains_key(node.id.as_str()) {
                continue;
            }
            let index = graph.add_node(position);
            node_indices.insert(node.id.as_str(), index);
        }

        let mut dangling = Vec::new();
        for (position, edge) in workflow.edges.iter().enumerate() {
            let from = node_indices.get(edge.source.as_str());
            let to = node_indices.get(edge.target.as_str());
            match (from, to) {
                (Some(from), Some(to)) => {
                    graph.add_edge(*from, *to, position);
                }
                _ => dangling.push(position),
            }
        }

        Self {
            workflow,
            graph,
            node_indices,
            dangling,
        }
    }

    /// Returns the underlying workflow definition.
    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    /// Returns the number of distinct nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges whose endpoints both exist.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns node indices in declaration order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Returns the index of a node by ID.
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }

    /// Returns the node definition at an index.
    pub fn node(&self, index: NodeIndex) -> &'a Node {
        &self.workflow.nodes[self.graph[index]]
    }

    /// Returns the ID of the node at an index.
    pub fn node_id(&self, index: NodeIndex) -> &'a NodeId {
        &self.node(index).id
    }

    /// Returns edges referencing at least one undeclared node, in declaration order.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &'a Edge> + '_ {
        self.dangling
            .iter()
            .map(|position| &self.workflow.edges[*position])
    }

    /// Returns outgoing edges of a node as `(target, edge)`, in edge declaration order.
    pub fn outgoing(&self, index: NodeIndex) -> Vec<(NodeIndex, &'a Edge)> {
        self.edges_directed(index, Direction::Outgoing)
    }

    /// Returns distinct downstream nodes in declaration order.
    pub fn successors(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut successors: Vec<_> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .collect();
        successors.sort_unstable();
        successors.dedup();
        successors
    }

    /// Returns distinct upstream nodes in edge declaration order.
    ///
    /// This is the order used to build keyed inputs for nodes with several
    /// incoming edges.
    pub fn predecessors(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        self.edges_directed(index, Direction::Incoming)
            .into_iter()
            .map(|(source, _)| source)
            .filter(|source| seen.insert(*source))
            .collect()
    }

    /// Returns the number of distinct upstream nodes.
    pub fn in_degree(&self, index: NodeIndex) -> usize {
        self.predecessors(index).len()
    }

    fn edges_directed(&self, index: NodeIndex, direction: Direction) -> Vec<(NodeIndex, &'a Edge)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, direction)
            .map(|edge_ref| {
                let other = match direction {
                    Direction::Outgoing => edge_ref.target(),
                    Direction::Incoming => edge_ref.source(),
                };
                (*edge_ref.weight(), other)
            })
            .collect();
        edges.sort_unstable_by_key(|(position, _)| *position);
        edges
            .into_iter()
            .map(|(position, other)| (other, &self.workflow.edges[position]))
            .collect()
    }
}
