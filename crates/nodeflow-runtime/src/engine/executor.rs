//! Workflow execution engine.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures::FutureExt;
use jiff::Timestamp;
use petgraph::graph::NodeIndex;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::context::{ExecutionContext, ExecutionStatus, NodeExecutionResult, Variables};
use super::observer::{ExecutionObserver, NodePhase, NoopObserver};
use super::retry::{RetryPolicy, SupervisedOutcome};
use super::EngineConfig;
use crate::definition::{Node, NodeId, Workflow};
use crate::error::{NodeError, WorkflowError, WorkflowResult};
use crate::graph::{ExecutionMode, ExecutionPlan, Scheduler, WorkflowGraph};
use crate::handler::{HandlerContext, HandlerRegistry, NodeHandler};
use crate::validation::{ValidationResult, Validator};

/// Tracing target for engine operations.
const TRACING_TARGET: &str = "nodeflow_runtime::engine";

/// Per-run options.
#[derive(Clone)]
pub struct RunOptions {
    variables: Variables,
    mode: Option<ExecutionMode>,
    observer: Arc<dyn ExecutionObserver>,
    cancel: CancellationToken,
}

impl RunOptions {
    /// Creates options with no variables, the engine's default mode and no observer.
    pub fn new() -> Self {
        Self {
            variables: Variables::new(),
            mode: None,
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the variables passed to root nodes.
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Overrides the engine's default scheduling mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the progress and error observer.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Uses an external cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the token that cancels this run.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("variables", &self.variables)
            .field("mode", &self.mode)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// The workflow execution engine.
///
/// Validates a workflow, computes its schedule once, and dispatches every
/// node to the handler registered for its type. Each run owns an independent
/// [`ExecutionContext`]; the number of concurrent runs is bounded by
/// [`EngineConfig::max_concurrent_runs`].
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    registry: Arc<HandlerRegistry>,
    validator: Validator,
    semaphore: Arc<Semaphore>,
}

/// How a planned node is dispatched.
enum Dispatch {
    /// Outcome decided without invoking a handler.
    Immediate(NodeExecutionResult, NodePhase),
    /// Handler invocation to supervise.
    Task(NodeTask),
}

/// Everything needed to run one node off the orchestrator.
struct NodeTask {
    node: Arc<Node>,
    handler: Arc<dyn NodeHandler>,
    input: Value,
    policy: RetryPolicy,
    execution_id: Uuid,
}

/// Outcome of a [`NodeTask`], or the panic if the handler panicked.
struct NodeOutcome {
    node_id: NodeId,
    started_at: Timestamp,
    supervised: Result<SupervisedOutcome<Value>, HandlerPanic>,
}

/// A panic caught while supervising a handler.
struct HandlerPanic {
    message: String,
    /// Retries consumed before the panicking attempt.
    retries: u32,
}

impl NodeTask {
    async fn run(self) -> NodeOutcome {
        let node_id = self.node.id.clone();
        let started_at = Timestamp::now();
        let attempts = AtomicU32::new(0);

        let supervised = AssertUnwindSafe(self.policy.supervise(&node_id, |attempt| {
            attempts.store(attempt, Ordering::Relaxed);
            let handler = self.handler.clone();
            let input = self.input.clone();
            let ctx = HandlerContext::new(self.execution_id, self.node.clone(), attempt);
            async move { handler.execute(input, &ctx).await }
        }))
        .catch_unwind()
        .await
        .map_err(|payload| HandlerPanic {
            message: panic_message(payload),
            retries: attempts.load(Ordering::Relaxed).saturating_sub(1),
        });

        NodeOutcome {
            node_id,
            started_at,
            supervised,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned())
}

impl Engine {
    /// Creates a new engine with the given configuration and handler registry.
    pub fn new(
        config: EngineConfig,
        registry: impl Into<Arc<HandlerRegistry>>,
    ) -> WorkflowResult<Self> {
        config.validate()?;

        let registry = registry.into();
        let validator = Validator::from_registry(registry.clone());
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_runs));

        tracing::info!(
            target: TRACING_TARGET,
            max_concurrent_runs = config.max_concurrent_runs,
            max_retries = config.max_retries,
            node_timeout_ms = config.node_timeout.as_millis() as u64,
            mode = %config.mode,
            handlers = registry.len(),
            "workflow engine initialized"
        );

        Ok(Self {
            config,
            registry,
            validator,
            semaphore,
        })
    }

    /// Creates a new engine with default configuration and the built-in handlers.
    pub fn with_defaults() -> Self {
        let config = EngineConfig::default();
        let registry = Arc::new(HandlerRegistry::with_builtins());
        Self {
            validator: Validator::from_registry(registry.clone()),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_runs)),
            config,
            registry,
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Validates a workflow without executing it.
    pub fn validate(&self, workflow: &Workflow) -> ValidationResult {
        self.validator.validate(workflow)
    }

    /// Validates a workflow and computes its schedule.
    ///
    /// Uses the engine's default mode when `mode` is `None`.
    pub fn plan(
        &self,
        workflow: &Workflow,
        mode: Option<ExecutionMode>,
    ) -> WorkflowResult<ExecutionPlan> {
        self.validate(workflow).into_result()?;
        let graph = WorkflowGraph::new(workflow);
        Scheduler::plan(&graph, mode.unwrap_or(self.config.mode))
    }

    /// Executes a workflow with the given variables and default options.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        variables: Variables,
    ) -> WorkflowResult<ExecutionContext> {
        self.execute_with(workflow, RunOptions::new().with_variables(variables))
            .await
    }

    /// Executes a workflow.
    ///
    /// An invalid workflow is refused with [`WorkflowError::InvalidWorkflow`]
    /// before any node runs. Otherwise the returned context's status is the
    /// outcome of the run: node failures and cancellation are reported there,
    /// not as errors.
    pub async fn execute_with(
        &self,
        workflow: &Workflow,
        options: RunOptions,
    ) -> WorkflowResult<ExecutionContext> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| WorkflowError::Internal(format!("semaphore closed: {}", e)))?;

        let mode = options.mode.unwrap_or(self.config.mode);
        let plan = self.plan(workflow, Some(mode))?;
        let graph = WorkflowGraph::new(workflow);
        let mut ctx = ExecutionContext::new(workflow.id, options.variables.clone());

        tracing::info!(
            target: TRACING_TARGET,
            workflow_id = %workflow.id,
            execution_id = %ctx.execution_id(),
            mode = %mode,
            node_count = plan.node_count(),
            "workflow execution started"
        );

        let status = match self.drive(&graph, &plan, &mut ctx, &options).await {
            Ok(status) => status,
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    execution_id = %ctx.execution_id(),
                    error = %error,
                    "workflow execution aborted"
                );
                ctx.log_error(None, error.to_string());
                ExecutionStatus::Failed
            }
        };
        ctx.transition(status)?;

        tracing::info!(
            target: TRACING_TARGET,
            execution_id = %ctx.execution_id(),
            status = %ctx.status(),
            completed = ctx.completed_count(),
            errors = ctx.errors().len(),
            "workflow execution finished"
        );

        Ok(ctx)
    }

    /// Runs the plan and returns the terminal status to record.
    async fn drive(
        &self,
        graph: &WorkflowGraph<'_>,
        plan: &ExecutionPlan,
        ctx: &mut ExecutionContext,
        options: &RunOptions,
    ) -> WorkflowResult<ExecutionStatus> {
        if options.cancel.is_cancelled() {
            tracing::info!(
                target: TRACING_TARGET,
                execution_id = %ctx.execution_id(),
                "cancelled before dispatch"
            );
            return Ok(ExecutionStatus::Cancelled);
        }
        ctx.transition(ExecutionStatus::Running)?;

        match plan {
            ExecutionPlan::Sequential(order) => self.run_sequential(graph, order, ctx, options).await,
            ExecutionPlan::Parallel(groups) => self.run_parallel(graph, groups, ctx, options).await,
        }
    }

    /// Runs one node at a time; the first failure halts the run.
    async fn run_sequential(
        &self,
        graph: &WorkflowGraph<'_>,
        order: &[NodeId],
        ctx: &mut ExecutionContext,
        options: &RunOptions,
    ) -> WorkflowResult<ExecutionStatus> {
        for node_id in order {
            if options.cancel.is_cancelled() {
                tracing::info!(
                    target: TRACING_TARGET,
                    execution_id = %ctx.execution_id(),
                    next = %node_id,
                    "cancellation observed"
                );
                return Ok(ExecutionStatus::Cancelled);
            }

            let failed = match self.prepare(graph, node_id, ctx, options)? {
                Dispatch::Immediate(result, phase) => {
                    Self::finish(ctx, options, result, phase);
                    false
                }
                Dispatch::Task(task) => Self::settle(ctx, options, task.run().await),
            };

            if failed {
                return Ok(ExecutionStatus::Failed);
            }
        }

        Ok(ExecutionStatus::Completed)
    }

    /// Runs ready groups one after another.
    ///
    /// Every member of a group is launched concurrently and joined before the
    /// next group starts. A failure lets the current group finish but stops
    /// the run afterwards.
    async fn run_parallel(
        &self,
        graph: &WorkflowGraph<'_>,
        groups: &[Vec<NodeId>],
        ctx: &mut ExecutionContext,
        options: &RunOptions,
    ) -> WorkflowResult<ExecutionStatus> {
        for (index, group) in groups.iter().enumerate() {
            if options.cancel.is_cancelled() {
                tracing::info!(
                    target: TRACING_TARGET,
                    execution_id = %ctx.execution_id(),
                    group = index,
                    "cancellation observed"
                );
                return Ok(ExecutionStatus::Cancelled);
            }

            tracing::debug!(
                target: TRACING_TARGET,
                execution_id = %ctx.execution_id(),
                group = index,
                size = group.len(),
                "dispatching ready group"
            );

            let mut failed = false;
            let mut tasks = JoinSet::new();
            for node_id in group {
                match self.prepare(graph, node_id, ctx, options)? {
                    Dispatch::Immediate(result, phase) => Self::finish(ctx, options, result, phase),
                    Dispatch::Task(task) => {
                        tasks.spawn(task.run());
                    }
                }
            }

            while let Some(joined) = tasks.join_next().await {
                let outcome = joined
                    .map_err(|e| WorkflowError::Internal(format!("node task failed: {}", e)))?;
                failed |= Self::settle(ctx, options, outcome);
            }

            if failed {
                return Ok(ExecutionStatus::Failed);
            }
        }

        Ok(ExecutionStatus::Completed)
    }

    /// Resolves a node's input and decides how it is dispatched.
    fn prepare(
        &self,
        graph: &WorkflowGraph<'_>,
        node_id: &NodeId,
        ctx: &ExecutionContext,
        options: &RunOptions,
    ) -> WorkflowResult<Dispatch> {
        let index = graph
            .index_of(node_id.as_str())
            .ok_or_else(|| WorkflowError::Internal(format!("planned node {} not found", node_id)))?;
        let node = graph.node(index);
        let input = resolve_input(graph, index, ctx);

        if node.disabled {
            tracing::debug!(
                target: TRACING_TARGET,
                node_id = %node.id,
                "node disabled, passing input through"
            );
            let result = NodeExecutionResult::skipped(node.id.clone(), input);
            return Ok(Dispatch::Immediate(result, NodePhase::Skipped));
        }

        options.observer.on_progress(&node.id, NodePhase::Started);

        let Some(handler) = self.registry.get(node.node_type.as_str()) else {
            tracing::warn!(
                target: TRACING_TARGET,
                node_id = %node.id,
                node_type = %node.node_type,
                "unknown node type, passing input through"
            );
            let result =
                NodeExecutionResult::success(node.id.clone(), input, Timestamp::now(), 0)
                    .with_fallback();
            return Ok(Dispatch::Immediate(result, NodePhase::Completed));
        };

        tracing::debug!(
            target: TRACING_TARGET,
            node_id = %node.id,
            node_type = %node.node_type,
            "dispatching node"
        );

        Ok(Dispatch::Task(NodeTask {
            node: Arc::new(node.clone()),
            handler,
            input,
            policy: self.config.retry_policy().with_override(node.retry.as_ref()),
            execution_id: ctx.execution_id(),
        }))
    }

    /// Records an outcome decided without a handler.
    fn finish(
        ctx: &mut ExecutionContext,
        options: &RunOptions,
        result: NodeExecutionResult,
        phase: NodePhase,
    ) {
        options.observer.on_progress(&result.node_id, phase);
        ctx.record(result);
    }

    /// Records a handler outcome. Returns whether the node failed.
    fn settle(ctx: &mut ExecutionContext, options: &RunOptions, outcome: NodeOutcome) -> bool {
        let NodeOutcome {
            node_id,
            started_at,
            supervised,
        } = outcome;

        let (result, message) = match supervised {
            Ok(SupervisedOutcome {
                result: Ok(output),
                retries,
            }) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    node_id = %node_id,
                    retries,
                    "node completed"
                );
                options.observer.on_progress(&node_id, NodePhase::Completed);
                ctx.record(NodeExecutionResult::success(node_id, output, started_at, retries));
                return false;
            }
            Ok(SupervisedOutcome {
                result: Err(error),
                retries,
            }) => {
                let message = error.to_string();
                let result = NodeExecutionResult::failure(node_id.clone(), &error, started_at, retries);
                (result, message)
            }
            Err(panic) => {
                let error = NodeError::Other(format!("handler panicked: {}", panic.message).into());
                let message = error.to_string();
                let result =
                    NodeExecutionResult::failure(node_id.clone(), &error, started_at, panic.retries);
                (result, message)
            }
        };

        tracing::warn!(
            target: TRACING_TARGET,
            node_id = %node_id,
            retries = result.retries,
            error = %message,
            "node failed"
        );

        ctx.log_error(Some(node_id.clone()), message.clone());
        ctx.record(result);
        options.observer.on_progress(&node_id, NodePhase::Failed);
        options.observer.on_error(&node_id, &message);
        true
    }
}

/// Computes the input of a node from the run state.
///
/// Roots receive the run variables, a node with one upstream receives that
/// upstream's result verbatim, and a node with several upstreams receives a
/// map from upstream node ID to result.
fn resolve_input(graph: &WorkflowGraph<'_>, index: NodeIndex, ctx: &ExecutionContext) -> Value {
    let upstream_result = |index: NodeIndex| {
        ctx.result(graph.node_id(index).as_str())
            .cloned()
            .unwrap_or(Value::Null)
    };

    match graph.predecessors(index).as_slice() {
        [] => Value::Object(ctx.variables().clone()),
        [single] => upstream_result(*single),
        many => Value::Object(
            many.iter()
                .map(|&index| (graph.node_id(index).to_string(), upstream_result(index)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::definition::{Edge, NodePolicy};
    use crate::engine::NodeStatus;
    use crate::error::NodeErrorKind;
    use crate::mock::{
        HangingHandler, PanickingHandler, RecordingHandler, RecordingObserver, ScriptedHandler,
    };
    use crate::validation::IssueKind;

    fn config(mode: ExecutionMode) -> EngineConfig {
        EngineConfig::builder()
            .mode(mode)
            .node_timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    fn engine(mode: ExecutionMode, registry: HandlerRegistry) -> Engine {
        Engine::new(config(mode), registry).unwrap()
    }

    fn chain(types: &[(&str, &str)]) -> Workflow {
        let mut workflow = Workflow::new();
        for (id, node_type) in types {
            workflow = workflow.with_node(Node::new(*id, *node_type));
        }
        for pair in types.windows(2) {
            workflow = workflow.with_edge(Edge::between(pair[0].0, pair[1].0));
        }
        workflow
    }

    fn position(events: &[String], event: &str) -> usize {
        events.iter().position(|e| e == event).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_order_breaks_ties_by_declaration() {
        let recorder = RecordingHandler::new();
        let registry = HandlerRegistry::new().with("rec", recorder.clone());
        let workflow = Workflow::new()
            .with_node(Node::new("A", "rec"))
            .with_node(Node::new("B", "rec"))
            .with_node(Node::new("C", "rec"))
            .with_node(Node::new("D", "rec"))
            .with_edge(Edge::between("A", "B"))
            .with_edge(Edge::between("B", "C"));

        let ctx = engine(ExecutionMode::Sequential, registry)
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Completed);
        let started: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("start:").map(str::to_owned))
            .collect();
        assert_eq!(started, ["A", "D", "B", "C"]);
        let completed: Vec<_> = ctx.node_results().iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(completed, ["A", "D", "B", "C"]);
    }

    #[tokio::test]
    async fn test_invalid_workflow_runs_nothing() {
        let recorder = RecordingHandler::new();
        let registry = HandlerRegistry::new().with("rec", recorder.clone());
        let workflow = chain(&[("a", "rec"), ("b", "rec")]).with_edge(Edge::between("b", "a"));

        let error = engine(ExecutionMode::Parallel, registry)
            .execute(&workflow, Variables::new())
            .await
            .unwrap_err();

        match error {
            WorkflowError::InvalidWorkflow(result) => {
                assert!(!result.valid);
                assert!(result.errors_of(IssueKind::Cycle).count() >= 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(recorder.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let flaky = ScriptedHandler::failing(3);
        let registry = HandlerRegistry::new().with("flaky", flaky.clone());
        let workflow = Workflow::new().with_node(Node::new("n", "flaky"));

        let ctx = engine(ExecutionMode::Sequential, registry)
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Completed);
        let result = ctx.node_result("n").unwrap();
        assert_eq!(result.status, NodeStatus::Success);
        assert_eq!(result.retries, 3);
        assert_eq!(flaky.calls(), 4);
        assert!(ctx.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts_budget() {
        let broken = ScriptedHandler::always_failing();
        let registry = HandlerRegistry::new().with("broken", broken.clone());
        let workflow = Workflow::new().with_node(Node::new("n", "broken"));

        let ctx = engine(ExecutionMode::Sequential, registry)
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Failed);
        assert_eq!(broken.calls(), 4);
        let result = ctx.node_result("n").unwrap();
        assert_eq!(result.retries, 3);
        assert_eq!(result.error_kind, Some(NodeErrorKind::Execution));
        assert_eq!(result.error.as_deref(), Some("scripted failure 4 of node n"));
        assert!(ctx.result("n").is_none());
        assert_eq!(ctx.errors().len(), 1);
        assert!(matches!(
            ctx.ensure_completed(),
            Err(WorkflowError::NodeFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_policy_overrides_budget() {
        let broken = ScriptedHandler::always_failing();
        let registry = HandlerRegistry::new().with("broken", broken.clone());
        let policy = NodePolicy {
            max_retries: Some(0),
            ..NodePolicy::default()
        };
        let workflow =
            Workflow::new().with_node(Node::new("n", "broken").with_policy(policy));

        let ctx = engine(ExecutionMode::Sequential, registry)
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Failed);
        assert_eq!(broken.calls(), 1);
        assert_eq!(ctx.node_result("n").unwrap().retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_settling_node_times_out() {
        let hanging = HangingHandler::new();
        let registry = HandlerRegistry::new().with("hang", hanging.clone());
        let config = EngineConfig::builder()
            .max_retries(0u32)
            .node_timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        let workflow = Workflow::new().with_node(Node::new("n", "hang"));

        let start = Instant::now();
        let ctx = Engine::new(config, registry)
            .unwrap()
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Failed);
        assert_eq!(hanging.calls(), 1);
        let result = ctx.node_result("n").unwrap();
        assert_eq!(result.error_kind, Some(NodeErrorKind::Timeout));
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test]
    async fn test_cancel_before_start_runs_nothing() {
        let recorder = RecordingHandler::new();
        let registry = HandlerRegistry::new().with("rec", recorder.clone());
        let workflow = chain(&[("a", "rec"), ("b", "rec")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
            let options = RunOptions::new()
                .with_mode(mode)
                .with_cancellation(cancel.clone());
            let ctx = engine(mode, registry.clone())
                .execute_with(&workflow, options)
                .await
                .unwrap();

            assert_eq!(ctx.status(), ExecutionStatus::Cancelled);
            assert!(ctx.node_results().is_empty());
            assert!(matches!(ctx.ensure_completed(), Err(WorkflowError::Cancelled)));
        }
        assert!(recorder.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run_finishes_current_group() {
        let cancel = CancellationToken::new();
        let recorder = RecordingHandler::new().with_delay(Duration::from_millis(100));
        let mut registry = HandlerRegistry::new().with("rec", recorder.clone());
        let trigger = cancel.clone();
        registry.register_fn("cancel", move |input, _| {
            let trigger = trigger.clone();
            async move {
                trigger.cancel();
                Ok(input)
            }
        });

        // groups: [a, d], [b]
        let workflow = Workflow::new()
            .with_node(Node::new("a", "cancel"))
            .with_node(Node::new("b", "rec"))
            .with_node(Node::new("d", "rec"))
            .with_edge(Edge::between("a", "b"));

        let options = RunOptions::new()
            .with_mode(ExecutionMode::Parallel)
            .with_cancellation(cancel);
        let ctx = engine(ExecutionMode::Parallel, registry)
            .execute_with(&workflow, options)
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Cancelled);
        assert!(ctx.result("a").is_some());
        assert_eq!(ctx.result("d"), Some(&json!("d")));
        assert!(ctx.result("b").is_none());
        assert_eq!(recorder.events(), ["start:d", "end:d"]);
    }

    #[tokio::test]
    async fn test_cancel_mid_sequential_run_stops_before_next_node() {
        let cancel = CancellationToken::new();
        let recorder = RecordingHandler::new();
        let mut registry = HandlerRegistry::new().with("rec", recorder.clone());
        let trigger = cancel.clone();
        registry.register_fn("cancel", move |input, _| {
            let trigger = trigger.clone();
            async move {
                trigger.cancel();
                Ok(input)
            }
        });

        let workflow = chain(&[("a", "cancel"), ("b", "rec")]);
        let options = RunOptions::new().with_cancellation(cancel);
        let ctx = engine(ExecutionMode::Sequential, registry)
            .execute_with(&workflow, options)
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Cancelled);
        assert!(ctx.result("a").is_some());
        assert!(ctx.result("b").is_none());
        assert!(recorder.events().is_empty());
        assert!(ctx.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_fails_fast() {
        let recorder = RecordingHandler::new();
        let registry = HandlerRegistry::with_builtins().with("rec", recorder.clone());
        let config = EngineConfig::builder().max_retries(1u32).build().unwrap();
        let workflow = Workflow::new()
            .with_node(Node::new("a", "fail").with_config(json!({"message": "boom"})))
            .with_node(Node::new("b", "rec"))
            .with_node(Node::new("c", "rec"))
            .with_edge(Edge::between("a", "b"));

        let ctx = Engine::new(config, registry)
            .unwrap()
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Failed);
        assert!(recorder.events().is_empty());
        assert_eq!(ctx.node_results().len(), 1);
        assert_eq!(ctx.errors()[0].message, "boom");
        assert_eq!(ctx.errors()[0].node_id.as_ref().unwrap().as_str(), "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_failure_lets_group_finish() {
        let recorder = RecordingHandler::new().with_delay(Duration::from_secs(3));
        let registry = HandlerRegistry::with_builtins().with("rec", recorder.clone());
        let config = EngineConfig::builder()
            .mode(ExecutionMode::Parallel)
            .max_retries(0u32)
            .build()
            .unwrap();
        // groups: [a, c], [b]
        let workflow = Workflow::new()
            .with_node(Node::new("a", "fail"))
            .with_node(Node::new("b", "rec"))
            .with_node(Node::new("c", "rec"))
            .with_edge(Edge::between("a", "b"));

        let ctx = Engine::new(config, registry)
            .unwrap()
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Failed);
        assert_eq!(recorder.events(), ["start:c", "end:c"]);
        assert_eq!(ctx.result("c"), Some(&json!("c")));
        assert!(ctx.node_result("b").is_none());
        // the failing sibling settles first
        let order: Vec<_> = ctx.node_results().iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[tokio::test]
    async fn test_parallel_and_sequential_results_match() {
        let mut workflow = Workflow::new();
        for (id, value) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            workflow = workflow.with_node(
                Node::new(id, "set").with_config(json!({"values": {"v": value}})),
            );
        }
        let variables = json!({"seed": true}).as_object().cloned().unwrap();

        let sequential = engine(ExecutionMode::Sequential, HandlerRegistry::with_builtins())
            .execute(&workflow, variables.clone())
            .await
            .unwrap();
        let parallel = engine(ExecutionMode::Parallel, HandlerRegistry::with_builtins())
            .execute(&workflow, variables)
            .await
            .unwrap();

        assert_eq!(sequential.status(), ExecutionStatus::Completed);
        assert_eq!(parallel.status(), ExecutionStatus::Completed);
        assert_eq!(sequential.results(), parallel.results());
        assert_eq!(parallel.result("c"), Some(&json!({"seed": true, "v": 3})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_respects_dependencies() {
        let recorder = RecordingHandler::new().with_delay(Duration::from_millis(50));
        let registry = HandlerRegistry::new().with("rec", recorder.clone());
        let workflow = Workflow::new()
            .with_node(Node::new("a", "rec"))
            .with_node(Node::new("b", "rec"))
            .with_node(Node::new("c", "rec"))
            .with_node(Node::new("d", "rec"))
            .with_node(Node::new("e", "rec"))
            .with_edge(Edge::between("a", "b"))
            .with_edge(Edge::between("a", "c"))
            .with_edge(Edge::between("b", "d"))
            .with_edge(Edge::between("c", "d"))
            .with_edge(Edge::between("e", "d"));

        let ctx = engine(ExecutionMode::Parallel, registry)
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Completed);
        let events = recorder.events();
        for edge in &workflow.edges {
            let end = position(&events, &format!("end:{}", edge.source));
            let start = position(&events, &format!("start:{}", edge.target));
            assert!(end < start, "{} must finish before {} starts", edge.source, edge.target);
        }
    }

    #[tokio::test]
    async fn test_input_resolution() {
        let recorder = RecordingHandler::new();
        let registry = HandlerRegistry::with_builtins().with("rec", recorder.clone());
        let workflow = Workflow::new()
            .with_node(Node::new("a", "set").with_config(json!({"values": {"x": 1}})))
            .with_node(Node::new("b", "passthrough"))
            .with_node(Node::new("c", "rec"))
            .with_node(Node::new("d", "rec"))
            .with_edge(Edge::between("a", "b"))
            .with_edge(Edge::between("b", "d"))
            .with_edge(Edge::between("c", "d"))
            .with_edge(Edge::new("dup", "c", "d"));
        let variables = json!({"v": 0}).as_object().cloned().unwrap();

        let ctx = engine(ExecutionMode::Sequential, registry)
            .execute(&workflow, variables)
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Completed);
        assert_eq!(ctx.result("b"), Some(&json!({"v": 0, "x": 1})));
        assert_eq!(recorder.input_of("c"), Some(json!({"v": 0})));
        assert_eq!(
            recorder.input_of("d"),
            Some(json!({"b": {"v": 0, "x": 1}, "c": "c"}))
        );
    }

    #[tokio::test]
    async fn test_disabled_node_is_skipped() {
        let observer = Arc::new(RecordingObserver::new());
        let workflow = Workflow::new()
            .with_node(Node::new("a", "set").with_config(json!({"values": {"x": 1}})))
            .with_node(Node::new("b", "fail").disabled())
            .with_node(Node::new("c", "passthrough"))
            .with_edge(Edge::between("a", "b"))
            .with_edge(Edge::between("b", "c"));

        let options = RunOptions::new().with_observer(observer.clone());
        let ctx = Engine::with_defaults()
            .execute_with(&workflow, options)
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Completed);
        assert_eq!(ctx.node_result("b").unwrap().status, NodeStatus::Skipped);
        assert_eq!(ctx.result("c"), Some(&json!({"x": 1})));
        assert_eq!(observer.phases_of("b"), [NodePhase::Skipped]);
        assert_eq!(ctx.completed_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_type_passes_through() {
        let workflow = Workflow::new().with_node(Node::new("x", "from_the_future"));
        let variables = json!({"k": "v"}).as_object().cloned().unwrap();

        let engine = Engine::with_defaults();
        let validation = engine.validate(&workflow);
        assert!(validation.valid);
        assert_eq!(validation.warnings_of(IssueKind::UnknownType).count(), 1);

        let ctx = engine.execute(&workflow, variables).await.unwrap();
        assert_eq!(ctx.status(), ExecutionStatus::Completed);
        assert_eq!(ctx.result("x"), Some(&json!({"k": "v"})));
        assert!(ctx.node_result("x").unwrap().fallback);
        assert!(ctx.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_fails_without_retry() {
        let panicking = PanickingHandler::new();
        let registry = HandlerRegistry::with_builtins().with("panic", panicking.clone());

        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
            let workflow = chain(&[("p", "panic"), ("after", "passthrough")]);
            let ctx = engine(mode, registry.clone())
                .execute(&workflow, Variables::new())
                .await
                .unwrap();

            assert_eq!(ctx.status(), ExecutionStatus::Failed);
            assert!(ctx.errors()[0].message.contains("panicked"));
            assert!(ctx.result("after").is_none());
        }
        assert_eq!(panicking.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_after_failed_attempt_keeps_retry_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut registry = HandlerRegistry::new();
        registry.register_fn("flaky_panic", move |_, ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if ctx.attempt() > 1 {
                    panic!("second attempt panicked");
                }
                Err::<Value, _>(NodeError::execution("first"))
            }
        });

        let workflow = Workflow::new().with_node(Node::new("n", "flaky_panic"));
        let ctx = Engine::new(EngineConfig::default(), registry)
            .unwrap()
            .execute(&workflow, Variables::new())
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let result = ctx.node_result("n").unwrap();
        assert_eq!(result.status, NodeStatus::Failure);
        assert_eq!(result.retries, 1);
        assert_eq!(result.error_kind, Some(NodeErrorKind::Other));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_callbacks() {
        let observer = Arc::new(RecordingObserver::new());
        let workflow = Workflow::new()
            .with_node(Node::new("a", "passthrough"))
            .with_node(Node::new("b", "fail").with_config(json!({"message": "nope"})))
            .with_edge(Edge::between("a", "b"));

        let options = RunOptions::new().with_observer(observer.clone());
        let ctx = Engine::with_defaults()
            .execute_with(&workflow, options)
            .await
            .unwrap();

        assert_eq!(ctx.status(), ExecutionStatus::Failed);
        assert_eq!(observer.phases_of("a"), [NodePhase::Started, NodePhase::Completed]);
        assert_eq!(observer.phases_of("b"), [NodePhase::Started, NodePhase::Failed]);
        assert_eq!(observer.errors(), [(NodeId::new("b"), "nope".to_owned())]);
    }

    #[tokio::test]
    async fn test_plan_and_independent_runs() {
        let engine = engine(ExecutionMode::Parallel, HandlerRegistry::with_builtins());
        let workflow = chain(&[("a", "passthrough"), ("b", "passthrough")])
            .with_node(Node::new("c", "passthrough"));

        let plan = engine.plan(&workflow, None).unwrap();
        assert_eq!(
            plan.groups(),
            [vec![&NodeId::new("a"), &NodeId::new("c")], vec![&NodeId::new("b")]]
        );

        let (first, second) = tokio::join!(
            engine.execute(&workflow, Variables::new()),
            engine.execute(&workflow, Variables::new())
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.execution_id(), second.execution_id());
        assert_eq!(first.results(), second.results());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EngineConfig {
            node_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(config, HandlerRegistry::new()),
            Err(WorkflowError::InvalidConfig(_))
        ));
    }
}
