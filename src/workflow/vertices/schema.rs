//! SchemaVertex: entry node that loads the database schema
//!
//! Connects to the configured target (or the shared default), introspects
//! tables, columns and enums, and stores the rendered text in `db_schema`.
//! Connection and query failures are recorded in `error`.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::NodeResources;
use crate::database::fetch_schema;
use crate::engine::error::EngineError;
use crate::engine::vertex::{ComputeResult, NodeContext, Vertex, VertexId};
use crate::state::StateUpdate;
use crate::workflow::node::SchemaNodeConfig;

pub struct SchemaVertex {
    id: VertexId,
    config: SchemaNodeConfig,
    resources: NodeResources,
}

impl SchemaVertex {
    pub fn new(id: impl Into<VertexId>, config: SchemaNodeConfig, resources: NodeResources) -> Self {
        Self {
            id: id.into(),
            config,
            resources,
        }
    }
}

#[async_trait]
impl Vertex for SchemaVertex {
    fn id(&self) -> &VertexId {
        &self.id
    }

    async fn compute(&self, _ctx: &NodeContext<'_>) -> Result<ComputeResult, EngineError> {
        let database = self.resources.require_database(&self.id)?;
        let target = self
            .resources
            .target(&self.id, self.config.connection_string.as_deref())?;

        let mut client = match database.connect(&target).await {
            Ok(client) => client,
            Err(e) => {
                warn!(node = %self.id, error = %e, "Schema fetch could not connect");
                return Ok(ComputeResult::continue_with(
                    StateUpdate::empty().with_error(format!("Failed to fetch schema: {}", e)),
                ));
            }
        };

        let fetched = fetch_schema(client.as_mut()).await;
        client.release().await;

        let update = match fetched {
            Ok(schema) => {
                debug!(node = %self.id, bytes = schema.len(), "Schema loaded");
                StateUpdate::empty().with_db_schema(schema)
            }
            Err(e) => {
                warn!(node = %self.id, error = %e, "Schema introspection failed");
                StateUpdate::empty().with_error(format!("Failed to fetch schema: {}", e))
            }
        };

        Ok(ComputeResult::continue_with(update))
    }
}
