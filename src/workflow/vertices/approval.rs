//! ApprovalVertex: human-in-the-loop suspend point
//!
//! The first visit suspends with an [`InterruptContext`]. The runtime
//! re-enters the vertex on resume with the decision already merged into
//! state, and the vertex then decides whether the run ends or loops back.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::engine::error::EngineError;
use crate::engine::vertex::{ComputeResult, InterruptContext, NodeContext, Vertex, VertexId};
use crate::state::StateUpdate;

pub struct ApprovalVertex {
    id: VertexId,
    question: String,
    retry_target: Option<VertexId>,
    max_attempts: u32,
}

impl ApprovalVertex {
    pub fn new(
        id: impl Into<VertexId>,
        question: impl Into<String>,
        retry_target: Option<VertexId>,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            retry_target,
            max_attempts,
        }
    }

    pub fn retry_target(&self) -> Option<&VertexId> {
        self.retry_target.as_ref()
    }
}

#[async_trait]
impl Vertex for ApprovalVertex {
    fn id(&self) -> &VertexId {
        &self.id
    }

    async fn compute(&self, ctx: &NodeContext<'_>) -> Result<ComputeResult, EngineError> {
        let Some(decision) = ctx.decision else {
            return Ok(ComputeResult::suspend(InterruptContext::from_state(
                self.question.clone(),
                ctx.state,
            )));
        };

        let attempts = ctx.state.attempt_count;
        if attempts >= self.max_attempts {
            info!(node = %self.id, attempts, "Attempt limit reached at approval");
            return Ok(ComputeResult::halt(
                StateUpdate::empty()
                    .with_approved(false)
                    .with_error(format!("Maximum retry attempts ({}) exceeded", self.max_attempts)),
            ));
        }

        if decision.approved {
            info!(node = %self.id, "Approved");
            return Ok(ComputeResult::continue_with(StateUpdate::empty()));
        }

        match &self.retry_target {
            Some(target) => {
                info!(node = %self.id, retry = %target, "Rejected, regenerating");
                Ok(ComputeResult::goto(target.clone(), StateUpdate::empty()))
            }
            None => {
                warn!(node = %self.id, "Rejected but no retry node is configured");
                Ok(ComputeResult::continue_with(StateUpdate::empty()))
            }
        }
    }
}
