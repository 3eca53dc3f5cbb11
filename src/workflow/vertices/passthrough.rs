//! PassThroughVertex: identity node used for entry markers and unknown kinds

use async_trait::async_trait;

use crate::engine::error::EngineError;
use crate::engine::vertex::{ComputeResult, NodeContext, Vertex, VertexId};
use crate::state::StateUpdate;

pub struct PassThroughVertex {
    id: VertexId,
}

impl PassThroughVertex {
    pub fn new(id: impl Into<VertexId>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Vertex for PassThroughVertex {
    fn id(&self) -> &VertexId {
        &self.id
    }

    async fn compute(&self, _ctx: &NodeContext<'_>) -> Result<ComputeResult, EngineError> {
        Ok(ComputeResult::continue_with(StateUpdate::empty()))
    }
}
