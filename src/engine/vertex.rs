//! Vertex (node) abstractions for the graph runtime
//!
//! A vertex is one unit of work in a compiled workflow. The runtime calls
//! [`Vertex::compute`] with a read-only [`NodeContext`] and interprets the
//! returned [`ComputeResult`] to decide where execution goes next.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::EngineError;
use crate::state::{ApprovalDecision, ExecutionState, QueryResult, StateUpdate};

/// Unique identifier for a vertex in the workflow graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub String);

impl VertexId {
    /// Create a new VertexId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VertexId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&VertexId> for VertexId {
    fn from(id: &VertexId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context provided to a vertex during computation
pub struct NodeContext<'a> {
    /// Read-only view of the current state
    pub state: &'a ExecutionState,
    /// Decision supplied by the caller; only set on the step that re-enters
    /// a suspended vertex.
    pub decision: Option<&'a ApprovalDecision>,
    /// Execution thread being driven
    pub thread_id: &'a str,
    /// Step number within the current drive (0-indexed)
    pub step: usize,
}

impl<'a> NodeContext<'a> {
    pub fn new(state: &'a ExecutionState, thread_id: &'a str, step: usize) -> Self {
        Self {
            state,
            decision: None,
            thread_id,
            step,
        }
    }

    /// Attach a resume decision
    pub fn with_decision(mut self, decision: &'a ApprovalDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Whether this step re-enters a previously suspended vertex
    pub fn is_resume(&self) -> bool {
        self.decision.is_some()
    }
}

/// Payload surfaced to the caller when an approval vertex suspends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptContext {
    pub question: String,
    pub generated_sql: String,
    pub query_result: Option<QueryResult>,
    pub user_query: String,
    pub attempt_count: u32,
}

impl InterruptContext {
    /// Snapshot the approval-relevant fields of a state
    pub fn from_state(question: impl Into<String>, state: &ExecutionState) -> Self {
        Self {
            question: question.into(),
            generated_sql: state.generated_sql.clone(),
            query_result: state.query_result.clone(),
            user_query: state.user_query.clone(),
            attempt_count: state.attempt_count,
        }
    }
}

/// Request to pause execution until an external decision arrives
#[derive(Debug, Clone, PartialEq)]
pub struct SuspendSignal {
    pub context: InterruptContext,
}

impl SuspendSignal {
    pub fn new(context: InterruptContext) -> Self {
        Self { context }
    }
}

/// Result of a vertex computation
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeResult {
    /// Merge the update and follow the vertex's outgoing route
    Continue(StateUpdate),
    /// Merge the update and jump to a specific vertex, ignoring routes
    Goto { target: VertexId, update: StateUpdate },
    /// Merge the update and terminate the run
    Halt(StateUpdate),
    /// Persist the state and hand control back to the caller
    Suspend(SuspendSignal),
}

impl ComputeResult {
    pub fn continue_with(update: StateUpdate) -> Self {
        Self::Continue(update)
    }

    pub fn goto(target: impl Into<VertexId>, update: StateUpdate) -> Self {
        Self::Goto {
            target: target.into(),
            update,
        }
    }

    pub fn halt(update: StateUpdate) -> Self {
        Self::Halt(update)
    }

    pub fn suspend(context: InterruptContext) -> Self {
        Self::Suspend(SuspendSignal::new(context))
    }

    /// Check if this result pauses execution
    pub fn is_suspend(&self) -> bool {
        matches!(self, ComputeResult::Suspend(_))
    }
}

/// The core vertex trait
///
/// Vertices never fail for domain reasons (bad SQL, unreachable database,
/// model errors); those are returned as `error` in the update. An `Err`
/// aborts the whole run and is reserved for missing collaborators or
/// configuration.
#[async_trait]
pub trait Vertex: Send + Sync {
    /// Get the vertex's unique identifier
    fn id(&self) -> &VertexId;

    /// Execute the vertex's computation
    async fn compute(&self, ctx: &NodeContext<'_>) -> Result<ComputeResult, EngineError>;
}

/// Boxed vertex for dynamic dispatch
pub type BoxedVertex = Arc<dyn Vertex>;
