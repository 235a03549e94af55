//! Structural workflow validation.
//!
//! [`Validator::validate`] is pure: it never mutates the workflow and returns
//! a fresh [`ValidationResult`] on every call. Checks run in this order:
//!
//! 1. the workflow declares at least one node
//! 2. every edge references declared nodes (one error per bad edge)
//! 3. nodes without incident edges are reported as warnings
//! 4. cycles are detected with a three-color depth-first traversal
//! 5. required configuration fields per node type are present
//! 6. node IDs are unique
//! 7. edge IDs are unique
//! 8. node policies are usable and registered handlers accept their node's
//!    configuration

mod issue;
mod rules;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use issue::{IssueKind, ValidationIssue, ValidationResult};
use petgraph::graph::NodeIndex;
pub use rules::RequiredFields;

use crate::definition::{Edge, NodeId, Workflow};
use crate::graph::WorkflowGraph;
use crate::handler::HandlerRegistry;

/// Tracing target for validation.
const TRACING_TARGET: &str = "nodeflow_runtime::validation";

/// Workflow validator.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    required_fields: RequiredFields,
    registry: Option<Arc<HandlerRegistry>>,
}

/// Node state during cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the current traversal path.
    Gray,
    /// Fully explored.
    Black,
}

/// A node on the DFS path with its outgoing edges and the next one to visit.
struct Frame<'a> {
    index: NodeIndex,
    outgoing: Vec<(NodeIndex, &'a Edge)>,
    cursor: usize,
}

impl<'a> Frame<'a> {
    fn new(graph: &WorkflowGraph<'a>, index: NodeIndex) -> Self {
        Self {
            index,
            outgoing: graph.outgoing(index),
            cursor: 0,
        }
    }
}

impl Validator {
    /// Creates a validator with no required-field rules and no registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator driven by a handler registry.
    ///
    /// Required fields come from the registered handlers, and each handler
    /// validates the configuration of the nodes it will execute.
    pub fn from_registry(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            required_fields: registry.required_fields(),
            registry: Some(registry),
        }
    }

    /// Adds explicit required-field rules.
    pub fn with_required_fields(mut self, table: RequiredFields) -> Self {
        self.required_fields.extend(table);
        self
    }

    /// Returns the required-field table in use.
    pub fn required_fields(&self) -> &RequiredFields {
        &self.required_fields
    }

    /// Validates a workflow.
    pub fn validate(&self, workflow: &Workflow) -> ValidationResult {
        let graph = WorkflowGraph::new(workflow);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        Self::check_non_empty(workflow, &mut errors);
        Self::check_edge_references(&graph, &mut errors);
        Self::check_isolated_nodes(workflow, &mut warnings);
        Self::check_cycles(&graph, &mut errors);
        let missing = self.check_required_fields(workflow, &mut errors);
        Self::check_duplicate_nodes(workflow, &mut errors);
        Self::check_duplicate_edges(workflow, &mut errors);
        Self::check_policies(workflow, &mut errors);
        self.check_handlers(workflow, &missing, &mut errors, &mut warnings);

        let result = ValidationResult::new(errors, warnings);

        tracing::debug!(
            target: TRACING_TARGET,
            workflow_id = %workflow.id,
            valid = result.valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "workflow validated"
        );

        result
    }

    fn check_non_empty(workflow: &Workflow, errors: &mut Vec<ValidationIssue>) {
        if workflow.nodes.is_empty() {
            errors.push(ValidationIssue::new(
                IssueKind::EmptyWorkflow,
                "workflow must have at least one node",
            ));
        }
    }

    fn check_edge_references(graph: &WorkflowGraph<'_>, errors: &mut Vec<ValidationIssue>) {
        for edge in graph.dangling_edges() {
            let missing: Vec<&str> = [&edge.source, &edge.target]
                .into_iter()
                .filter(|id| graph.index_of(id.as_str()).is_none())
                .map(NodeId::as_str)
                .collect();

            errors.push(
                ValidationIssue::new(
                    IssueKind::DanglingEdge,
                    format!(
                        "edge {} references non-existent node(s): {}",
                        edge.id,
                        missing.join(", ")
                    ),
                )
                .with_edge(edge.id.clone()),
            );
        }
    }

    fn check_isolated_nodes(workflow: &Workflow, warnings: &mut Vec<ValidationIssue>) {
        if workflow.nodes.len() <= 1 {
            return;
        }

        let touched: HashSet<&str> = workflow
            .edges
            .iter()
            .flat_map(|edge| [edge.source.as_str(), edge.target.as_str()])
            .collect();

        for node in &workflow.nodes {
            if !touched.contains(node.id.as_str()) {
                warnings.push(
                    ValidationIssue::new(
                        IssueKind::IsolatedNode,
                        format!("node {} has no connections", node.id),
                    )
                    .with_node(node.id.clone()),
                );
            }
        }
    }

    /// Three-color iterative depth-first search.
    ///
    /// Every edge into a gray node closes a cycle and yields one error tagged
    /// with that edge and the node it re-enters.
    fn check_cycles(graph: &WorkflowGraph<'_>, errors: &mut Vec<ValidationIssue>) {
        let mut color = vec![Color::White; graph.node_count()];

        for root in graph.indices() {
            if color[root.index()] != Color::White {
                continue;
            }

            color[root.index()] = Color::Gray;
            let mut stack = vec![Frame::new(graph, root)];

            while let Some(frame) = stack.last_mut() {
                let Some(&(next, edge)) = frame.outgoing.get(frame.cursor) else {
                    color[frame.index.index()] = Color::Black;
                    stack.pop();
                    continue;
                };
                frame.cursor += 1;

                match color[next.index()] {
                    Color::White => {
                        color[next.index()] = Color::Gray;
                        stack.push(Frame::new(graph, next));
                    }
                    Color::Gray => {
                        let start = stack
                            .iter()
                            .position(|frame| frame.index == next)
                            .unwrap_or_default();
                        let mut path: Vec<&str> = stack[start..]
                            .iter()
                            .map(|frame| graph.node_id(frame.index).as_str())
                            .collect();
                        path.push(graph.node_id(next).as_str());

                        errors.push(
                            ValidationIssue::new(
                                IssueKind::Cycle,
                                format!("cycle detected: {}", path.join(" -> ")),
                            )
                            .with_node(graph.node_id(next).clone())
                            .with_edge(edge.id.clone()),
                        );
                    }
                    Color::Black => {}
                }
            }
        }
    }

    /// Returns the IDs of nodes missing at least one required field.
    fn check_required_fields<'a>(
        &self,
        workflow: &'a Workflow,
        errors: &mut Vec<ValidationIssue>,
    ) -> HashSet<&'a str> {
        let mut missing_any = HashSet::new();
        if self.required_fields.is_empty() {
            return missing_any;
        }

        for node in &workflow.nodes {
            for field in self.required_fields.fields_for(node.node_type.as_str()) {
                if node.config_field(field).is_none() {
                    missing_any.insert(node.id.as_str());
                    errors.push(
                        ValidationIssue::new(
                            IssueKind::MissingField,
                            format!("node {} is missing required config field '{}'", node.id, field),
                        )
                        .with_node(node.id.clone()),
                    );
                }
            }
        }

        missing_any
    }

    fn check_duplicate_nodes(workflow: &Workflow, errors: &mut Vec<ValidationIssue>) {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for node in &workflow.nodes {
            let count = seen.entry(node.id.as_str()).or_default();
            *count += 1;
            if *count == 2 {
                errors.push(
                    ValidationIssue::new(
                        IssueKind::DuplicateNodeId,
                        format!("node id {} is declared more than once", node.id),
                    )
                    .with_node(node.id.clone()),
                );
            }
        }
    }

    fn check_duplicate_edges(workflow: &Workflow, errors: &mut Vec<ValidationIssue>) {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for edge in &workflow.edges {
            let count = seen.entry(edge.id.as_str()).or_default();
            *count += 1;
            if *count == 2 {
                errors.push(
                    ValidationIssue::new(
                        IssueKind::DuplicateEdgeId,
                        format!("edge id {} is declared more than once", edge.id),
                    )
                    .with_edge(edge.id.clone()),
                );
            }
        }
    }

    fn check_policies(workflow: &Workflow, errors: &mut Vec<ValidationIssue>) {
        for node in &workflow.nodes {
            if node.retry.and_then(|policy| policy.timeout_ms) == Some(0) {
                errors.push(
                    ValidationIssue::new(
                        IssueKind::InvalidConfig,
                        format!("node {} has a zero timeout_ms", node.id),
                    )
                    .with_node(node.id.clone()),
                );
            }
        }
    }

    fn check_handlers(
        &self,
        workflow: &Workflow,
        missing: &HashSet<&str>,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        let Some(registry) = &self.registry else {
            return;
        };

        for node in &workflow.nodes {
            let Some(handler) = registry.get(node.node_type.as_str()) else {
                warnings.push(
                    ValidationIssue::new(
                        IssueKind::UnknownType,
                        format!(
                            "node {} has unregistered type '{}' and will pass its input through",
                            node.id, node.node_type
                        ),
                    )
                    .with_node(node.id.clone()),
                );
                continue;
            };

            if missing.contains(node.id.as_str()) {
                continue;
            }

            if let Err(message) = handler.validate(&node.config) {
                errors.push(
                    ValidationIssue::new(
                        IssueKind::InvalidConfig,
                        format!("node {} has invalid config: {}", node.id, message),
                    )
                    .with_node(node.id.clone()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::definition::{Edge, Node, NodePolicy};

    fn registry_validator() -> Validator {
        Validator::from_registry(Arc::new(HandlerRegistry::with_builtins()))
    }

    #[test]
    fn test_valid_workflow() {
        let def = Workflow::new()
            .with_node(Node::new("a", "passthrough"))
            .with_node(Node::new("b", "passthrough"))
            .with_edge(Edge::between("a", "b"));
        let result = registry_validator().validate(&def);
        assert!(result.is_valid());
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_workflow() {
        let result = Validator::new().validate(&Workflow::new());
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, IssueKind::EmptyWorkflow);
    }

    #[test]
    fn test_dangling_edge_names_missing_node() {
        let def = Workflow::new()
            .with_node(Node::new("A", "passthrough"))
            .with_node(Node::new("B", "passthrough"))
            .with_edge(Edge::new("e1", "A", "B"))
            .with_edge(Edge::new("e2", "A", "Z"));
        let result = Validator::new().validate(&def);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        let error = &result.errors[0];
        assert_eq!(error.kind, IssueKind::DanglingEdge);
        assert_eq!(error.edge_id.as_ref().map(|e| e.as_str()), Some("e2"));
        assert!(error.message.contains("Z"));
    }

    #[test]
    fn test_dangling_edge_with_both_ends_missing_is_one_error() {
        let def = Workflow::new()
            .with_node(Node::new("A", "passthrough"))
            .with_edge(Edge::new("e1", "X", "Y"));
        let result = Validator::new().validate(&def);
        assert_eq!(result.errors_of(IssueKind::DanglingEdge).count(), 1);
        assert!(result.errors[0].message.contains("X, Y"));
    }

    #[test]
    fn test_isolated_node_is_warning_only() {
        let def = Workflow::new()
            .with_node(Node::new("a", "passthrough"))
            .with_node(Node::new("b", "passthrough"))
            .with_node(Node::new("c", "passthrough"))
            .with_edge(Edge::between("a", "b"));
        let result = Validator::new().validate(&def);
        assert!(result.valid);
        let isolated: Vec<_> = result
            .warnings_of(IssueKind::IsolatedNode)
            .map(|w| w.node_id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(isolated, ["c"]);
    }

    #[test]
    fn test_single_node_is_not_isolated() {
        let def = Workflow::new().with_node(Node::new("a", "passthrough"));
        let result = Validator::new().validate(&def);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let def = Workflow::new()
            .with_node(Node::new("a", "passthrough"))
            .with_node(Node::new("b", "passthrough"))
            .with_node(Node::new("c", "passthrough"))
            .with_edge(Edge::between("a", "b"))
            .with_edge(Edge::between("b", "c"))
            .with_edge(Edge::between("c", "a"));
        let result = Validator::new().validate(&def);
        assert!(!result.valid);
        let cycles: Vec<_> = result.errors_of(IssueKind::Cycle).collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].message, "cycle detected: a -> b -> c -> a");
        assert_eq!(cycles[0].edge_id.as_ref().unwrap().as_str(), "c->a");
        assert_eq!(cycles[0].node_id.as_ref().unwrap().as_str(), "a");
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let def = Workflow::new()
            .with_node(Node::new("a", "passthrough"))
            .with_edge(Edge::between("a", "a"));
        let result = Validator::new().validate(&def);
        assert_eq!(result.errors_of(IssueKind::Cycle).count(), 1);
        assert_eq!(result.errors[0].message, "cycle detected: a -> a");
    }

    #[test]
    fn test_diamond_is_not_cycle() {
        let def = Workflow::new()
            .with_node(Node::new("a", "passthrough"))
            .with_node(Node::new("b", "passthrough"))
            .with_node(Node::new("c", "passthrough"))
            .with_node(Node::new("d", "passthrough"))
            .with_edge(Edge::between("a", "b"))
            .with_edge(Edge::between("a", "c"))
            .with_edge(Edge::between("b", "d"))
            .with_edge(Edge::between("c", "d"));
        assert!(Validator::new().validate(&def).valid);
    }

    #[test]
    fn test_missing_required_field() {
        let def = Workflow::new()
            .with_node(Node::new("s", "set"))
            .with_node(Node::new("d", "delay").with_config(json!({"duration_ms": null})));
        let result = registry_validator().validate(&def);
        let missing: Vec<_> = result.errors_of(IssueKind::MissingField).collect();
        assert_eq!(missing.len(), 2);
        assert!(missing[0].message.contains("'values'"));
        assert_eq!(missing[1].node_id.as_ref().unwrap().as_str(), "d");
        // handler validation is skipped for nodes already missing fields
        assert_eq!(result.errors_of(IssueKind::InvalidConfig).count(), 0);
    }

    #[test]
    fn test_explicit_required_fields() {
        let table = RequiredFields::new().with("http", ["url"]);
        let def = Workflow::new().with_node(Node::new("h", "http"));
        let result = Validator::new().with_required_fields(table).validate(&def);
        assert_eq!(result.errors_of(IssueKind::MissingField).count(), 1);
    }

    #[test]
    fn test_handler_rejects_config() {
        let def = Workflow::new()
            .with_node(Node::new("s", "set").with_config(json!({"values": [1]})));
        let result = registry_validator().validate(&def);
        assert_eq!(result.errors_of(IssueKind::InvalidConfig).count(), 1);
    }

    #[test]
    fn test_zero_node_timeout_is_invalid() {
        let zero = NodePolicy {
            timeout_ms: Some(0),
            ..NodePolicy::default()
        };
        let def = Workflow::new()
            .with_node(Node::new("a", "passthrough").with_policy(zero))
            .with_node(Node::new("b", "future_type").with_policy(zero));
        let result = Validator::new().validate(&def);
        let invalid: Vec<_> = result.errors_of(IssueKind::InvalidConfig).collect();
        assert_eq!(invalid.len(), 2);
        assert_eq!(invalid[0].message, "node a has a zero timeout_ms");

        let def = Workflow::new().with_node(Node::new("a", "passthrough").with_policy(NodePolicy {
            timeout_ms: Some(1),
            ..NodePolicy::default()
        }));
        assert!(Validator::new().validate(&def).valid);
    }

    #[test]
    fn test_high_fan_out_hub() {
        let mut def = Workflow::new().with_node(Node::new("hub", "passthrough"));
        for i in 0..2000 {
            let id = format!("n{i}");
            def = def
                .with_node(Node::new(id.as_str(), "passthrough"))
                .with_edge(Edge::between("hub", id.as_str()))
                .with_edge(Edge::new(format!("back{i}"), id.as_str(), "sink"));
        }
        def = def.with_node(Node::new("sink", "passthrough"));

        let result = Validator::new().validate(&def);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unknown_type_is_warning() {
        let def = Workflow::new().with_node(Node::new("x", "future_type"));
        let result = registry_validator().validate(&def);
        assert!(result.valid);
        assert_eq!(result.warnings_of(IssueKind::UnknownType).count(), 1);
    }

    #[test]
    fn test_duplicate_ids() {
        let def = Workflow::new()
            .with_node(Node::new("a", "passthrough"))
            .with_node(Node::new("a", "passthrough"))
            .with_node(Node::new("a", "passthrough"))
            .with_edge(Edge::new("e", "a", "a"))
            .with_edge(Edge::new("e", "a", "a"));
        let result = Validator::new().validate(&def);
        assert_eq!(result.errors_of(IssueKind::DuplicateNodeId).count(), 1);
        assert_eq!(result.errors_of(IssueKind::DuplicateEdgeId).count(), 1);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let def = Workflow::new()
            .with_node(Node::new("a", "set"))
            .with_node(Node::new("b", "passthrough"))
            .with_node(Node::new("c", "passthrough"))
            .with_edge(Edge::between("b", "c"))
            .with_edge(Edge::between("c", "b"))
            .with_edge(Edge::between("c", "q"));
        let validator = registry_validator();
        let first = validator.validate(&def);
        let second = validator.validate(&def);
        assert_eq!(first, second);
        assert!(!first.valid);
    }

    #[test]
    fn test_check_order() {
        let def = Workflow::new()
            .with_node(Node::new("a", "set"))
            .with_node(Node::new("b", "passthrough"))
            .with_edge(Edge::between("b", "b"))
            .with_edge(Edge::between("b", "q"));
        let result = registry_validator().validate(&def);
        let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [IssueKind::DanglingEdge, IssueKind::Cycle, IssueKind::MissingField]
        );
    }
}
