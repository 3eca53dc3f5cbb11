//! SqlExecuteVertex: runs the generated SQL and answers the question
//!
//! The query result is summarized for the model, which writes the
//! natural-language answer appended to the conversation. Execution failures
//! set `error` and append nothing, so the graph can loop back to generation.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::NodeResources;
use crate::engine::error::EngineError;
use crate::engine::vertex::{ComputeResult, NodeContext, Vertex, VertexId};
use crate::state::{Message, QueryResult, StateUpdate};
use crate::workflow::node::SqlExecuteNodeConfig;

pub struct SqlExecuteVertex {
    id: VertexId,
    config: SqlExecuteNodeConfig,
    resources: NodeResources,
}

impl SqlExecuteVertex {
    pub fn new(
        id: impl Into<VertexId>,
        config: SqlExecuteNodeConfig,
        resources: NodeResources,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            resources,
        }
    }

    async fn answer(&self, ctx: &NodeContext<'_>, result: &QueryResult) -> Result<String, EngineError> {
        let llm = self.resources.require_llm(&self.id)?;
        let messages = self
            .resources
            .prompts
            .answer(ctx.state, result, self.config.sample_rows);

        let fallback = format!("Query returned {} rows.", result.row_count);
        Ok(match llm.complete(&messages, self.resources.llm_config.as_ref()).await {
            Ok(response) if !response.content().trim().is_empty() => {
                response.content().trim().to_string()
            }
            Ok(_) => {
                warn!(node = %self.id, "Empty answer from model, using row count");
                fallback
            }
            Err(e) => {
                warn!(node = %self.id, error = %e, "Answer summarization failed, using row count");
                fallback
            }
        })
    }
}

#[async_trait]
impl Vertex for SqlExecuteVertex {
    fn id(&self) -> &VertexId {
        &self.id
    }

    async fn compute(&self, ctx: &NodeContext<'_>) -> Result<ComputeResult, EngineError> {
        let database = self.resources.require_database(&self.id)?;
        let target = self
            .resources
            .target(&self.id, self.config.connection_string.as_deref())?;

        let sql = ctx.state.generated_sql.trim();
        if sql.is_empty() {
            // Keep an earlier generation error; it says more than this one.
            if ctx.state.error.is_some() {
                return Ok(ComputeResult::continue_with(StateUpdate::empty()));
            }
            return Ok(ComputeResult::continue_with(
                StateUpdate::empty().with_error("No SQL statement to execute"),
            ));
        }

        let mut client = match database.connect(&target).await {
            Ok(client) => client,
            Err(e) => {
                warn!(node = %self.id, error = %e, "Execution could not connect");
                return Ok(ComputeResult::continue_with(
                    StateUpdate::empty().with_error(e.to_string()),
                ));
            }
        };
        let executed = client.query(sql).await;
        client.release().await;

        let result = match executed {
            Ok(result) => result,
            Err(e) => {
                debug!(node = %self.id, error = %e, "SQL execution failed");
                return Ok(ComputeResult::continue_with(
                    StateUpdate::empty().with_error(e.to_string()),
                ));
            }
        };

        debug!(node = %self.id, rows = result.row_count, "SQL executed");
        let answer = self.answer(ctx, &result).await?;

        Ok(ComputeResult::continue_with(
            StateUpdate::empty()
                .with_query_result(result)
                .with_message(Message::assistant(&answer)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use crate::state::{ExecutionState, Role};
    use crate::workflow::vertices::testing::ScriptedLlm;
    use serde_json::json;
    use std::sync::Arc;

    fn vertex(db: &MemoryDatabase, llm: ScriptedLlm) -> SqlExecuteVertex {
        let resources = NodeResources::new()
            .with_llm(Arc::new(llm))
            .with_database(Arc::new(db.clone()))
            .with_default_target("postgres://local");
        SqlExecuteVertex::new("execute", SqlExecuteNodeConfig::default(), resources)
    }

    fn state_with_sql(sql: &str) -> ExecutionState {
        let mut state = ExecutionState::new("how many users?");
        state.generated_sql = sql.into();
        state
    }

    #[tokio::test]
    async fn test_success_appends_answer() {
        let db = MemoryDatabase::new().with_rows("SELECT count(*) FROM \"User\"", vec![json!({"count": 3})]);
        let vertex = vertex(&db, ScriptedLlm::new(vec!["There are 3 users."]));

        let state = state_with_sql("SELECT count(*) FROM \"User\"");
        let result = vertex.compute(&NodeContext::new(&state, "t", 0)).await.unwrap();
        let ComputeResult::Continue(update) = result else {
            panic!("expected continue");
        };

        assert_eq!(update.query_result.unwrap().row_count, 1);
        assert_eq!(update.conversation.len(), 1);
        assert_eq!(update.conversation[0].role, Role::Assistant);
        assert_eq!(update.conversation[0].content, "There are 3 users.");
        assert!(update.error.is_none());
        assert_eq!(db.releases().await, 1);
    }

    #[tokio::test]
    async fn test_failure_sets_error_without_message() {
        let db = MemoryDatabase::new().with_failure("SELECT nope", "column \"nope\" does not exist");
        let vertex = vertex(&db, ScriptedLlm::new(vec!["unused"]));

        let state = state_with_sql("SELECT nope");
        let result = vertex.compute(&NodeContext::new(&state, "t", 0)).await.unwrap();
        let ComputeResult::Continue(update) = result else {
            panic!("expected continue");
        };

        assert!(update.conversation.is_empty());
        assert!(update.query_result.is_none());
        assert!(update.error.flatten().unwrap().contains("does not exist"));
        assert_eq!(db.releases().await, 1);
    }

    #[tokio::test]
    async fn test_summarization_failure_falls_back() {
        let db = MemoryDatabase::new().with_fallback_rows(vec![json!({"id": 1}), json!({"id": 2})]);
        let vertex = vertex(&db, ScriptedLlm::failing("timeout"));

        let state = state_with_sql("SELECT id FROM t");
        let result = vertex.compute(&NodeContext::new(&state, "t", 0)).await.unwrap();
        let ComputeResult::Continue(update) = result else {
            panic!("expected continue");
        };
        assert_eq!(update.conversation[0].content, "Query returned 2 rows.");
    }

    #[tokio::test]
    async fn test_empty_sql() {
        let db = MemoryDatabase::new();
        let vertex = vertex(&db, ScriptedLlm::new(vec!["unused"]));

        let state = state_with_sql("   ");
        let result = vertex.compute(&NodeContext::new(&state, "t", 0)).await.unwrap();
        let ComputeResult::Continue(update) = result else {
            panic!("expected continue");
        };
        assert!(update.error.flatten().is_some());
        assert!(db.connections().await.is_empty());

        let mut failed = state_with_sql("");
        failed.error = Some("SQL generation failed: timeout".into());
        let result = vertex.compute(&NodeContext::new(&failed, "t", 0)).await.unwrap();
        let ComputeResult::Continue(update) = result else {
            panic!("expected continue");
        };
        assert!(update.is_empty());
    }
}
