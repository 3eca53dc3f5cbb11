//! ConditionVertex: evaluates a predicate for yes/no routing
//!
//! Only `condition_result` is written, except when the attempt bound is
//! reached: then the result is forced to false and the run halts with an
//! error so a retry loop always terminates.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::engine::error::EngineError;
use crate::engine::vertex::{ComputeResult, NodeContext, Vertex, VertexId};
use crate::state::StateUpdate;
use crate::workflow::condition::Condition;

pub struct ConditionVertex {
    id: VertexId,
    condition: Option<Condition>,
    max_attempts: u32,
}

impl ConditionVertex {
    pub fn new(id: impl Into<VertexId>, condition: Option<Condition>, max_attempts: u32) -> Self {
        Self {
            id: id.into(),
            condition,
            max_attempts,
        }
    }
}

#[async_trait]
impl Vertex for ConditionVertex {
    fn id(&self) -> &VertexId {
        &self.id
    }

    async fn compute(&self, ctx: &NodeContext<'_>) -> Result<ComputeResult, EngineError> {
        let attempts = ctx.state.attempt_count;
        if attempts >= self.max_attempts {
            info!(node = %self.id, attempts, "Attempt limit reached");
            return Ok(ComputeResult::halt(
                StateUpdate::empty()
                    .with_condition_result(false)
                    .with_approved(false)
                    .with_error(format!("Maximum retry attempts ({}) exceeded", self.max_attempts)),
            ));
        }

        let result = match &self.condition {
            Some(condition) => condition.evaluate(ctx.state),
            None => {
                warn!(node = %self.id, "Condition node has no predicate configured");
                false
            }
        };
        debug!(node = %self.id, result, "Condition evaluated");

        Ok(ComputeResult::continue_with(
            StateUpdate::empty().with_condition_result(result),
        ))
    }
}
