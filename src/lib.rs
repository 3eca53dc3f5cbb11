//! sqlflow: workflow graphs for LLM-driven SQL agents with human approval
//!
//! Workflows are stored as node/connection definitions, compiled once into
//! executable graphs and run by a sequential interpreter that can suspend at
//! approval nodes and resume later from a checkpoint.
//!
//! - [`WorkflowDefinition`]: declarative nodes and connections (JSON or YAML)
//! - [`GraphCompiler`]: validates a definition and builds a [`CompiledGraph`]
//! - [`GraphRuntime`]: runs a compiled graph, checkpointing at suspend points
//! - [`WorkflowExecutor`]: request-level entry point keyed by workflow and thread ids
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sqlflow::{SqlAgentWorkflowBuilder, SqlflowConfig, MemoryWorkflowStore, PostgresAccessor};
//!
//! let config = SqlflowConfig::from_env()?;
//! let store = Arc::new(MemoryWorkflowStore::with_workflows([
//!     SqlAgentWorkflowBuilder::new("sql-agent").build(),
//! ]));
//! let executor = config
//!     .build_executor_with_store(store, config.llm_provider()?, Arc::new(PostgresAccessor::default()))
//!     .await?;
//!
//! let response = executor.execute_workflow("sql-agent", "Top 5 customers by revenue").await?;
//! ```

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod executor;
pub mod llm;
pub mod prompts;
pub mod sql_agent;
pub mod state;
pub mod store;
pub mod workflow;

// Re-exports for convenience
pub use config::SqlflowConfig;
pub use error::{DatabaseError, FlowError, LlmError, StoreError};
pub use executor::{ApprovalResponse, ExecutionResponse, WorkflowExecutor};
pub use sql_agent::SqlAgentWorkflowBuilder;
pub use state::{merge_state, ApprovalDecision, ExecutionState, Message, QueryResult, Role, StateUpdate};
pub use store::{FileWorkflowStore, MemoryWorkflowStore, WorkflowStore};

// Engine exports
pub use engine::{
    create_checkpointer, Checkpoint, Checkpointer, CheckpointerConfig, EngineConfig, EngineError,
    FileCheckpointer, GraphRuntime, InterruptContext, MemoryCheckpointer, RunOutcome,
    SuspendDescriptor,
};
#[cfg(feature = "checkpointer-sqlite")]
pub use engine::SqliteCheckpointer;

// Workflow exports
pub use workflow::{
    CompileError, CompiledGraph, Condition, ConditionOperator, Connection, GraphCache,
    GraphCompiler, NodeDefinition, NodeKind, NodeResources, WorkflowDefinition,
};

// Collaborator exports
pub use database::{DatabaseAccessor, DatabaseClient, MemoryDatabase};
#[cfg(feature = "postgres")]
pub use database::PostgresAccessor;
pub use llm::{LLMConfig, LLMProvider, LLMResponse, OpenAIProvider};
pub use prompts::SqlPrompts;
