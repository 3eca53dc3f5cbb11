//! Vertex implementations for workflow nodes
//!
//! Each vertex type implements the Vertex trait and corresponds to a NodeKind variant.
//!
//! # Available Vertices
//!
//! - [`schema::SchemaVertex`]: Loads the database schema into state
//! - [`sql_generate::SqlGenerateVertex`]: Asks the LLM for a SQL statement
//! - [`sql_execute::SqlExecuteVertex`]: Runs the SQL and summarizes the result
//! - [`approval::ApprovalVertex`]: Suspends for a human decision
//! - [`condition::ConditionVertex`]: Evaluates a predicate for yes/no routing
//! - [`passthrough::PassThroughVertex`]: Does nothing

pub mod approval;
pub mod condition;
pub mod passthrough;
pub mod schema;
pub mod sql_execute;
pub mod sql_generate;

pub use approval::ApprovalVertex;
pub use condition::ConditionVertex;
pub use passthrough::PassThroughVertex;
pub use schema::SchemaVertex;
pub use sql_execute::SqlExecuteVertex;
pub use sql_generate::SqlGenerateVertex;

use std::sync::Arc;

use crate::database::DatabaseAccessor;
use crate::engine::config::DEFAULT_MAX_ATTEMPTS;
use crate::engine::error::EngineError;
use crate::engine::vertex::{BoxedVertex, VertexId};
use crate::llm::{LLMConfig, LLMProvider};
use crate::prompts::SqlPrompts;
use crate::workflow::node::NodeConfig;

/// Collaborators shared by every vertex of a compiled graph
#[derive(Clone)]
pub struct NodeResources {
    pub llm: Option<Arc<dyn LLMProvider>>,
    pub llm_config: Option<LLMConfig>,
    pub database: Option<Arc<dyn DatabaseAccessor>>,
    /// Connection target used when a node config names none
    pub default_target: Option<String>,
    pub max_attempts: u32,
    pub prompts: SqlPrompts,
}

impl Default for NodeResources {
    fn default() -> Self {
        Self {
            llm: None,
            llm_config: None,
            database: None,
            default_target: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            prompts: SqlPrompts::default(),
        }
    }
}

impl std::fmt::Debug for NodeResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeResources")
            .field("llm", &self.llm.as_ref().map(|llm| llm.name()))
            .field("llm_config", &self.llm_config)
            .field("database", &self.database.is_some())
            .field("default_target", &self.default_target.is_some())
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl NodeResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    pub fn with_database(mut self, database: Arc<dyn DatabaseAccessor>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = Some(target.into());
        self
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn with_prompts(mut self, prompts: SqlPrompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub(crate) fn require_llm(&self, vertex: &VertexId) -> Result<Arc<dyn LLMProvider>, EngineError> {
        self.llm
            .clone()
            .ok_or_else(|| EngineError::node_error(vertex, "no LLM provider configured"))
    }

    pub(crate) fn require_database(
        &self,
        vertex: &VertexId,
    ) -> Result<Arc<dyn DatabaseAccessor>, EngineError> {
        self.database
            .clone()
            .ok_or_else(|| EngineError::node_error(vertex, "no database accessor configured"))
    }

    /// Node-level target first, then the shared default
    pub(crate) fn target(
        &self,
        vertex: &VertexId,
        configured: Option<&str>,
    ) -> Result<String, EngineError> {
        configured
            .filter(|t| !t.trim().is_empty())
            .or(self.default_target.as_deref())
            .map(str::to_string)
            .ok_or_else(|| EngineError::node_error(vertex, "no database connection target configured"))
    }
}

/// Build the vertex for a parsed node config.
///
/// `retry_target` is only used by approval vertices.
pub fn build_vertex(
    id: VertexId,
    config: NodeConfig,
    resources: &NodeResources,
    retry_target: Option<VertexId>,
) -> BoxedVertex {
    match config {
        NodeConfig::Schema(config) => Arc::new(SchemaVertex::new(id, config, resources.clone())),
        NodeConfig::SqlGenerate(config) => {
            Arc::new(SqlGenerateVertex::new(id, config, resources.clone()))
        }
        NodeConfig::SqlExecute(config) => {
            Arc::new(SqlExecuteVertex::new(id, config, resources.clone()))
        }
        NodeConfig::Approval(config) => {
            let max_attempts = config.max_attempts.unwrap_or(resources.max_attempts).max(1);
            Arc::new(ApprovalVertex::new(id, config.question, retry_target, max_attempts))
        }
        NodeConfig::Condition(config) => {
            let max_attempts = config.max_attempts.unwrap_or(resources.max_attempts).max(1);
            Arc::new(ConditionVertex::new(id, config.condition(), max_attempts))
        }
        NodeConfig::PassThrough => Arc::new(PassThroughVertex::new(id)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    use crate::error::LlmError;
    use crate::llm::{LLMConfig, LLMProvider, LLMResponse};
    use crate::state::{Message, Role};

    /// Replays canned replies in order, repeating the last one.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedLlm {
        replies: Arc<Vec<Result<String, LlmError>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Arc::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Arc::default(),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                replies: Arc::new(vec![Err(LlmError::Request(message.to_string()))]),
                prompts: Arc::default(),
            }
        }

        /// User prompts received so far
        pub(crate) fn prompts(&self) -> Vec<String> {
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
            let prompt = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            prompts.push(prompt);

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
}
