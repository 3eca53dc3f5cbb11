//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use sqlflow::{
    EngineConfig, GraphCompiler, GraphRuntime, LLMConfig, LLMProvider, LLMResponse, LlmError,
    MemoryCheckpointer, MemoryDatabase, MemoryWorkflowStore, Message, NodeResources, Role,
    SqlAgentWorkflowBuilder, WorkflowExecutor,
};

pub const USERS_SQL: &str = r#"SELECT * FROM "User";"#;

/// Language model that replays canned replies in order, repeating the last one.
#[derive(Clone)]
pub struct ScriptedLlm {
    replies: Arc<Vec<Result<String, LlmError>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Arc::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            prompts: Arc::default(),
        }
    }

    /// User prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[Message],
        _config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LlmError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(
            messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default(),
        );

        let index = (prompts.len() - 1).min(self.replies.len().saturating_sub(1));
        match self.replies.get(index) {
            Some(Ok(reply)) => Ok(LLMResponse::new(Message::assistant(reply))),
            Some(Err(e)) => Err(e.clone()),
            None => Err(LlmError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }
}

/// Database with a one-table schema and a three-row `User` table
pub fn users_database() -> MemoryDatabase {
    MemoryDatabase::new()
        .with_schema(
            vec![
                json!({"table_name": "User", "column_name": "id", "data_type": "integer", "is_nullable": "NO"}),
                json!({"table_name": "User", "column_name": "email", "data_type": "text", "is_nullable": "YES"}),
            ],
            vec![],
        )
        .with_rows(
            USERS_SQL,
            vec![
                json!({"id": 1, "email": "a@example.com"}),
                json!({"id": 2, "email": "b@example.com"}),
                json!({"id": 3, "email": "c@example.com"}),
            ],
        )
}

pub fn resources(llm: &ScriptedLlm, database: &MemoryDatabase) -> NodeResources {
    NodeResources::new()
        .with_llm(Arc::new(llm.clone()))
        .with_database(Arc::new(database.clone()))
        .with_default_target("memory://shop")
}

/// Executor serving the canonical `sql-agent` workflow from memory
pub fn sql_agent_executor(llm: &ScriptedLlm, database: &MemoryDatabase) -> WorkflowExecutor {
    let store = MemoryWorkflowStore::with_workflows([SqlAgentWorkflowBuilder::new("sql-agent").build()]);
    WorkflowExecutor::new(
        Arc::new(store),
        GraphCompiler::new(resources(llm, database)),
        GraphRuntime::new(EngineConfig::default(), Arc::new(MemoryCheckpointer::new())),
    )
}
