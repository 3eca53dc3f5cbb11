//! SqlGenerateVertex: asks the language model for a SQL statement
//!
//! Every invocation counts as one attempt, whether or not the model call
//! succeeds. Markdown code fences around the answer are stripped.

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use super::NodeResources;
use crate::engine::error::EngineError;
use crate::engine::vertex::{ComputeResult, NodeContext, Vertex, VertexId};
use crate::llm::LLMConfig;
use crate::state::StateUpdate;
use crate::workflow::node::SqlGenerateNodeConfig;

pub struct SqlGenerateVertex {
    id: VertexId,
    config: SqlGenerateNodeConfig,
    resources: NodeResources,
}

impl SqlGenerateVertex {
    pub fn new(
        id: impl Into<VertexId>,
        config: SqlGenerateNodeConfig,
        resources: NodeResources,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            resources,
        }
    }

    /// Shared LLM config with this node's overrides applied
    fn llm_config(&self, default_model: &str) -> Option<LLMConfig> {
        let has_overrides = self.config.model.is_some() || self.config.temperature.is_some();
        match &self.resources.llm_config {
            Some(base) => Some(base.overridden(self.config.model.as_deref(), self.config.temperature)),
            None if has_overrides => Some(
                LLMConfig::new(default_model)
                    .overridden(self.config.model.as_deref(), self.config.temperature),
            ),
            None => None,
        }
    }
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> String {
    if let Ok(re) = Regex::new(r"(?is)```(?:sql|postgresql|postgres|psql)?\s*(.*?)```") {
        if let Some(caps) = re.captures(text) {
            if let Some(body) = caps.get(1) {
                return body.as_str().trim().to_string();
            }
        }
    }
    text.trim().trim_matches('`').trim().to_string()
}

#[async_trait]
impl Vertex for SqlGenerateVertex {
    fn id(&self) -> &VertexId {
        &self.id
    }

    async fn compute(&self, ctx: &NodeContext<'_>) -> Result<ComputeResult, EngineError> {
        let llm = self.resources.require_llm(&self.id)?;
        let attempt = ctx.state.attempt_count.saturating_add(1);
        let update = StateUpdate::empty().with_attempt_count(attempt);

        let messages = self.resources.prompts.generation(ctx.state);
        let config = self.llm_config(llm.default_model());

        let update = match llm.complete(&messages, config.as_ref()).await {
            Ok(response) => {
                let sql = strip_code_fences(response.content());
                if sql.is_empty() {
                    warn!(node = %self.id, attempt, "Model returned no SQL");
                    update.with_error("Model returned an empty SQL statement")
                } else {
                    debug!(node = %self.id, attempt, sql = %sql, "SQL generated");
                    update.with_generated_sql(sql).clear_error()
                }
            }
            Err(e) => {
                warn!(node = %self.id, attempt, error = %e, "SQL generation failed");
                update.with_error(format!("SQL generation failed: {}", e))
            }
        };

        Ok(ComputeResult::continue_with(update))
    }
}
