//! Workflow executor: the request-level entry point
//!
//! Ties together the workflow store, the compiled graph cache and the graph
//! runtime. A request either completes or comes back interrupted at an
//! approval node; the caller answers with [`WorkflowExecutor::submit_approval`].
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlflow::{WorkflowExecutor, MemoryWorkflowStore, GraphCompiler, NodeResources};
//!
//! let executor = WorkflowExecutor::new(store, GraphCompiler::new(resources), runtime);
//! match executor.execute_workflow("sql-agent", "How many users signed up today?").await? {
//!     ExecutionResponse::Interrupted { thread_id, context, .. } => {
//!         println!("{}\n{}", context.question, context.generated_sql);
//!         executor.submit_approval(&thread_id, true, None).await?;
//!     }
//!     ExecutionResponse::Completed { content, .. } => println!("{}", content),
//! }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{EngineError, GraphRuntime, InterruptContext, RunOutcome};
use crate::error::FlowError;
use crate::state::{ApprovalDecision, ExecutionState};
use crate::store::WorkflowStore;
use crate::workflow::{CompiledGraph, GraphCache, GraphCompiler};

/// Result of starting a workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecutionResponse {
    #[serde(rename_all = "camelCase")]
    Completed {
        completed: bool,
        thread_id: String,
        content: String,
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Interrupted {
        interrupted: bool,
        thread_id: String,
        context: InterruptContext,
    },
}

impl ExecutionResponse {
    pub fn thread_id(&self) -> &str {
        match self {
            ExecutionResponse::Completed { thread_id, .. }
            | ExecutionResponse::Interrupted { thread_id, .. } => thread_id,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ExecutionResponse::Interrupted { .. })
    }
}

/// Result of answering an approval request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApprovalResponse {
    #[serde(rename_all = "camelCase")]
    Completed {
        completed: bool,
        content: String,
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Interrupted {
        interrupted: bool,
        context: InterruptContext,
    },
}

impl ApprovalResponse {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ApprovalResponse::Interrupted { .. })
    }
}

/// Error text worth surfacing for a finished run
fn surfaced_error(state: &ExecutionState) -> Option<String> {
    state.error.clone().filter(|e| !e.is_empty())
}

/// Executes stored workflows by id.
///
/// Safe to share across tasks; every run is keyed by its own thread id.
pub struct WorkflowExecutor {
    store: Arc<dyn WorkflowStore>,
    cache: GraphCache,
    runtime: GraphRuntime,
}

impl WorkflowExecutor {
    pub fn new(store: Arc<dyn WorkflowStore>, compiler: GraphCompiler, runtime: GraphRuntime) -> Self {
        Self {
            store,
            cache: GraphCache::new(compiler),
            runtime,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    pub fn runtime(&self) -> &GraphRuntime {
        &self.runtime
    }

    /// Compiled graph for a stored workflow, through the cache
    pub async fn compiled_graph(&self, workflow_id: &str) -> Result<Arc<CompiledGraph>, FlowError> {
        let definition = self
            .store
            .get(workflow_id)
            .await?
            .ok_or_else(|| FlowError::WorkflowNotFound(workflow_id.to_string()))?;
        Ok(self.cache.get_or_compile(&definition).await?)
    }

    /// Start a workflow on a fresh thread.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        user_query: &str,
    ) -> Result<ExecutionResponse, FlowError> {
        let thread_id = Uuid::new_v4().to_string();
        self.execute_workflow_on_thread(workflow_id, user_query, &thread_id)
            .await
    }

    /// Start a workflow on a caller-chosen thread id.
    ///
    /// Fails if the thread already has a suspended run.
    pub async fn execute_workflow_on_thread(
        &self,
        workflow_id: &str,
        user_query: &str,
        thread_id: &str,
    ) -> Result<ExecutionResponse, FlowError> {
        let graph = self.compiled_graph(workflow_id).await?;
        info!(workflow_id, thread_id, "Executing workflow");

        let outcome = self
            .runtime
            .run(&graph, thread_id, ExecutionState::new(user_query))
            .await?;

        Ok(match outcome {
            RunOutcome::Completed(state) => ExecutionResponse::Completed {
                completed: true,
                thread_id: thread_id.to_string(),
                content: state.final_content(),
                approved: state.approved,
                error: surfaced_error(&state),
            },
            RunOutcome::Suspended(suspended) => ExecutionResponse::Interrupted {
                interrupted: true,
                thread_id: suspended.thread_id,
                context: suspended.context,
            },
        })
    }

    /// Answer a pending approval and continue the run.
    pub async fn submit_approval(
        &self,
        thread_id: &str,
        approved: bool,
        feedback: Option<String>,
    ) -> Result<ApprovalResponse, FlowError> {
        let checkpoint = self
            .runtime
            .checkpointer()
            .load(thread_id)
            .await?
            .ok_or_else(|| EngineError::checkpoint_not_found(thread_id))?;

        let graph = self.compiled_graph(&checkpoint.workflow_id).await?;
        let decision = ApprovalDecision { approved, feedback };
        info!(
            workflow_id = %checkpoint.workflow_id,
            thread_id,
            approved,
            "Resuming workflow with approval decision"
        );

        let outcome = self.runtime.resume(&graph, thread_id, &decision).await?;
        Ok(match outcome {
            RunOutcome::Completed(state) => ApprovalResponse::Completed {
                completed: true,
                content: state.final_content(),
                approved: state.approved,
                error: surfaced_error(&state),
            },
            RunOutcome::Suspended(suspended) => ApprovalResponse::Interrupted {
                interrupted: true,
                context: suspended.context,
            },
        })
    }

    /// Drop a suspended run without resuming it. Returns whether one existed.
    pub async fn abandon(&self, thread_id: &str) -> Result<bool, FlowError> {
        let existed = self.runtime.checkpointer().take(thread_id).await?.is_some();
        if existed {
            info!(thread_id, "Suspended run abandoned");
        } else {
            warn!(thread_id, "No suspended run to abandon");
        }
        Ok(existed)
    }

    /// Thread ids with a suspended run
    pub async fn pending_threads(&self) -> Result<Vec<String>, FlowError> {
        Ok(self.runtime.checkpointer().list().await?)
    }

    /// Drop one workflow's compiled graph, or all of them.
    ///
    /// Must be called after a workflow's nodes or connections change.
    pub async fn invalidate_compiled_graph(&self, workflow_id: Option<&str>) -> usize {
        self.cache.invalidate(workflow_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use crate::engine::{EngineConfig, MemoryCheckpointer};
    use crate::sql_agent::SqlAgentWorkflowBuilder;
    use crate::store::MemoryWorkflowStore;
    use crate::workflow::vertices::testing::ScriptedLlm;
    use crate::workflow::NodeResources;
    use serde_json::json;

    const SQL: &str = "SELECT count(*) AS n FROM users";

    fn executor(llm: ScriptedLlm, database: MemoryDatabase) -> WorkflowExecutor {
        let store = MemoryWorkflowStore::with_workflows([SqlAgentWorkflowBuilder::new("sql-agent")
            .connection_string("memory://shop")
            .build()]);
        let resources = NodeResources::new()
            .with_llm(Arc::new(llm))
            .with_database(Arc::new(database));
        WorkflowExecutor::new(
            Arc::new(store),
            GraphCompiler::new(resources),
            GraphRuntime::new(EngineConfig::default(), Arc::new(MemoryCheckpointer::new())),
        )
    }

    fn database() -> MemoryDatabase {
        MemoryDatabase::new()
            .with_schema(vec![], vec![])
            .with_rows(SQL, vec![json!({"n": 3})])
    }

    #[tokio::test]
    async fn test_execute_then_approve() {
        let executor = executor(ScriptedLlm::new(vec![SQL, "There are 3 users."]), database());

        let response = executor
            .execute_workflow("sql-agent", "How many users?")
            .await
            .unwrap();
        let ExecutionResponse::Interrupted { thread_id, context, .. } = response else {
            panic!("expected interrupt, got {:?}", response);
        };
        assert_eq!(context.generated_sql, SQL);
        assert_eq!(context.attempt_count, 1);
        assert_eq!(executor.pending_threads().await.unwrap(), vec![thread_id.clone()]);

        let response = executor.submit_approval(&thread_id, true, None).await.unwrap();
        assert_eq!(
            response,
            ApprovalResponse::Completed {
                completed: true,
                content: "There are 3 users.".to_string(),
                approved: true,
                error: None,
            }
        );
        assert!(executor.pending_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_response_wire_shape() {
        let executor = executor(ScriptedLlm::new(vec![SQL, "There are 3 users."]), database());
        let response = executor
            .execute_workflow_on_thread("sql-agent", "How many users?", "t-1")
            .await
            .unwrap();

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["interrupted"], json!(true));
        assert_eq!(value["threadId"], json!("t-1"));
        assert_eq!(value["context"]["generatedSql"], json!(SQL));
        assert!(value.get("completed").is_none());
    }

    #[tokio::test]
    async fn test_unknown_workflow_and_thread() {
        let executor = executor(ScriptedLlm::new(vec![SQL]), database());

        let err = executor.execute_workflow("missing", "q").await.unwrap_err();
        assert!(matches!(err, FlowError::WorkflowNotFound(_)));

        let err = executor.submit_approval("nope", true, None).await.unwrap_err();
        assert!(matches!(err, FlowError::Engine(EngineError::CheckpointNotFound(_))));
    }

    #[tokio::test]
    async fn test_abandon_and_invalidate() {
        let executor = executor(ScriptedLlm::new(vec![SQL, "answer"]), database());
        let response = executor.execute_workflow("sql-agent", "q").await.unwrap();
        assert!(response.is_interrupted());

        assert!(executor.abandon(response.thread_id()).await.unwrap());
        assert!(!executor.abandon(response.thread_id()).await.unwrap());

        assert_eq!(executor.cache().len().await, 1);
        assert_eq!(executor.invalidate_compiled_graph(Some("sql-agent")).await, 1);
        assert!(executor.cache().is_empty().await);
    }
}
