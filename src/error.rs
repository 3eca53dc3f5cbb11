//! Error types shared across the crate
//!
//! Collaborator errors (`LlmError`, `DatabaseError`, `StoreError`) are plain
//! data for the nodes that encounter them: nodes turn them into
//! `ExecutionState.error` rather than propagating. `FlowError` is the
//! top-level error surfaced to callers of the executor.

use thiserror::Error;

use crate::engine::error::EngineError;
use crate::workflow::compiled::CompileError;

/// Language-model invocation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM configuration error: {0}")]
    Config(String),
}

/// Database access failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("No database target configured")]
    NoTarget,
}

/// Workflow definition store failure
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid workflow definition in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid workflow id: {0}")]
    InvalidId(String),
}

/// Top-level error for workflow execution requests
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error("Execution error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}
