//! Graph runtime: the interpreter loop for compiled workflows
//!
//! Execution is sequential. Each step runs one vertex under the node
//! timeout, merges its update into the state and picks the next vertex:
//!
//! ```text
//!   ┌──────────┐   Continue    ┌────────────┐   Some(next)
//!   │ compute  │ ────────────▶ │ route.next │ ──────────────▶ (loop)
//!   └────┬─────┘               └─────┬──────┘
//!        │ Goto(target) ─────────────┼──────────────────────▶ (loop)
//!        │ Halt                      │ None
//!        ▼                           ▼
//!    Completed                   Completed
//!        │ Suspend
//!        ▼
//!   checkpoint saved ──▶ Suspended (resume re-enters the same vertex)
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::checkpoint::{Checkpoint, Checkpointer};
use super::config::EngineConfig;
use super::error::EngineError;
use super::vertex::{ComputeResult, InterruptContext, NodeContext, VertexId};
use crate::state::{merge_state, ApprovalDecision, ExecutionState};
use crate::workflow::compiled::CompiledGraph;

/// Where a suspended run is waiting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendDescriptor {
    pub thread_id: String,
    pub node_id: VertexId,
    pub context: InterruptContext,
}

/// How a run or resume ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The graph terminated; the final state
    Completed(ExecutionState),
    /// A suspend point was reached; the state is in the checkpoint store
    Suspended(SuspendDescriptor),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, RunOutcome::Suspended(_))
    }

    pub fn state(&self) -> Option<&ExecutionState> {
        match self {
            RunOutcome::Completed(state) => Some(state),
            RunOutcome::Suspended(_) => None,
        }
    }
}

/// Executes compiled graphs and persists suspended runs
pub struct GraphRuntime {
    config: EngineConfig,
    checkpointer: Arc<dyn Checkpointer>,
}

impl GraphRuntime {
    pub fn new(config: EngineConfig, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            config,
            checkpointer,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Run a graph from its entry node.
    ///
    /// Fails if `thread_id` already has a suspended execution.
    pub async fn run(
        &self,
        graph: &CompiledGraph,
        thread_id: &str,
        initial: ExecutionState,
    ) -> Result<RunOutcome, EngineError> {
        if self.checkpointer.load(thread_id).await?.is_some() {
            return Err(EngineError::checkpoint_error(format!(
                "thread {} already has a suspended execution",
                thread_id
            )));
        }

        info!(
            workflow_id = %graph.workflow_id(),
            thread_id,
            entry = %graph.entry(),
            "Run started"
        );
        self.drive(graph, thread_id, graph.entry().clone(), initial, None)
            .await
    }

    /// Resume a suspended run with an external decision.
    ///
    /// The checkpoint is consumed, the decision merged into its state, and the
    /// suspended vertex re-entered with the decision in its context.
    pub async fn resume(
        &self,
        graph: &CompiledGraph,
        thread_id: &str,
        decision: &ApprovalDecision,
    ) -> Result<RunOutcome, EngineError> {
        let checkpoint = self
            .checkpointer
            .load(thread_id)
            .await?
            .ok_or_else(|| EngineError::checkpoint_not_found(thread_id))?;

        if checkpoint.workflow_id != graph.workflow_id() {
            return Err(EngineError::checkpoint_mismatch(
                graph.workflow_id(),
                checkpoint.workflow_id,
            ));
        }
        if !graph.contains(&checkpoint.node_id) {
            return Err(EngineError::UnknownNode(checkpoint.node_id));
        }

        // A concurrent resume may have taken it between load and take.
        let checkpoint = self
            .checkpointer
            .take(thread_id)
            .await?
            .ok_or_else(|| EngineError::checkpoint_not_found(thread_id))?;

        info!(
            workflow_id = %graph.workflow_id(),
            thread_id,
            node = %checkpoint.node_id,
            approved = decision.approved,
            "Run resumed"
        );

        let state = merge_state(&checkpoint.state, decision.into());
        self.drive(graph, thread_id, checkpoint.node_id, state, Some(decision))
            .await
    }

    async fn drive(
        &self,
        graph: &CompiledGraph,
        thread_id: &str,
        start: VertexId,
        initial: ExecutionState,
        mut decision: Option<&ApprovalDecision>,
    ) -> Result<RunOutcome, EngineError> {
        let mut current = start;
        let mut state = initial;
        let mut step = 0usize;
        let max_steps = self.step_limit(graph);

        loop {
            if step >= max_steps {
                warn!(thread_id, max_steps, "Step limit reached");
                return Err(EngineError::MaxStepsExceeded(max_steps));
            }
            step += 1;

            let vertex = graph
                .vertex(&current)
                .cloned()
                .ok_or_else(|| EngineError::UnknownNode(current.clone()))?;

            if self.config.tracing_enabled {
                debug!(
                    thread_id,
                    step,
                    node = %current,
                    attempt = state.attempt_count,
                    "Executing node"
                );
            }

            let result = {
                let mut ctx = NodeContext::new(&state, thread_id, step);
                if let Some(decision) = decision.take() {
                    ctx = ctx.with_decision(decision);
                }
                match timeout(self.config.node_timeout, vertex.compute(&ctx)).await {
                    Ok(result) => result?,
                    Err(_) => return Err(EngineError::NodeTimeout(current)),
                }
            };

            match result {
                ComputeResult::Continue(update) => {
                    state = merge_state(&state, update);
                    let route = graph.route(&current);
                    let next = route.and_then(|route| route.next(&state));
                    if route.is_some_and(|route| route.consumes_condition_result()) {
                        state.condition_result = None;
                    }
                    match next {
                        Some(next) => current = next,
                        None => return Ok(self.complete(graph, thread_id, step, state)),
                    }
                }
                ComputeResult::Goto { target, update } => {
                    state = merge_state(&state, update);
                    if !graph.contains(&target) {
                        return Err(EngineError::UnknownNode(target));
                    }
                    debug!(thread_id, from = %current, to = %target, "Jump");
                    current = target;
                }
                ComputeResult::Halt(update) => {
                    state = merge_state(&state, update);
                    return Ok(self.complete(graph, thread_id, step, state));
                }
                ComputeResult::Suspend(signal) => {
                    if !graph.is_suspend_point(&current) {
                        return Err(EngineError::node_error(
                            &current,
                            "only suspend-point nodes may suspend execution",
                        ));
                    }

                    let checkpoint = Checkpoint::new(
                        thread_id,
                        graph.workflow_id(),
                        current.clone(),
                        state,
                    )
                    .with_metadata("step", step.to_string());
                    self.checkpointer.save(&checkpoint).await?;

                    info!(
                        workflow_id = %graph.workflow_id(),
                        thread_id,
                        node = %current,
                        step,
                        "Run suspended"
                    );
                    return Ok(RunOutcome::Suspended(SuspendDescriptor {
                        thread_id: thread_id.to_string(),
                        node_id: current,
                        context: signal.context,
                    }));
                }
            }
        }
    }

    /// The configured backstop, raised so that a graph can always exhaust its
    /// retry bound before the backstop trips.
    fn step_limit(&self, graph: &CompiledGraph) -> usize {
        self.config.max_steps.max(graph.step_budget())
    }

    fn complete(
        &self,
        graph: &CompiledGraph,
        thread_id: &str,
        steps: usize,
        state: ExecutionState,
    ) -> RunOutcome {
        info!(
            workflow_id = %graph.workflow_id(),
            thread_id,
            steps,
            approved = state.approved,
            error = state.error.as_deref().unwrap_or(""),
            "Run completed"
        );
        RunOutcome::Completed(state)
    }
}
