//! Error types for the execution engine
//!
//! Only programming and infrastructure failures end up here. Domain failures
//! (bad SQL, unreachable database, model errors) are carried in
//! `ExecutionState.error` and never abort a run.

use super::vertex::VertexId;
use thiserror::Error;

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum EngineError {
    /// A node could not execute (missing collaborator or required config)
    #[error("Node error in {vertex_id}: {message}")]
    NodeError {
        vertex_id: VertexId,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Node computation exceeded the configured timeout
    #[error("Node timeout: {0}")]
    NodeTimeout(VertexId),

    /// Routing pointed at a node the graph does not contain
    #[error("Unknown node: {0}")]
    UnknownNode(VertexId),

    /// Step backstop reached without termination
    #[error("Max steps exceeded: {0}")]
    MaxStepsExceeded(usize),

    /// Checkpoint storage failure
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// No suspended execution exists for the thread
    #[error("No checkpoint found for thread {0}")]
    CheckpointNotFound(String),

    /// Checkpoint belongs to a different workflow than the graph resuming it
    #[error("Checkpoint workflow mismatch: expected {expected}, found {found}")]
    CheckpointMismatch { expected: String, found: String },

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl EngineError {
    /// Create a node error with a message
    pub fn node_error(vertex_id: impl Into<VertexId>, message: impl Into<String>) -> Self {
        Self::NodeError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a node error with source
    pub fn node_error_with_source(
        vertex_id: impl Into<VertexId>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::NodeError {
            vertex_id: vertex_id.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint_error(message: impl Into<String>) -> Self {
        Self::CheckpointError(message.into())
    }

    /// Create a checkpoint-not-found error
    pub fn checkpoint_not_found(thread_id: impl Into<String>) -> Self {
        Self::CheckpointNotFound(thread_id.into())
    }

    /// Create a checkpoint mismatch error
    pub fn checkpoint_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::CheckpointMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if the error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::NodeTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::EngineError: Send, Sync);
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::MaxStepsExceeded(100);
        assert_eq!(format!("{}", err), "Max steps exceeded: 100");
    }

    #[test]
    fn test_node_error() {
        let err = EngineError::node_error("generate", "no LLM provider configured");
        match err {
            EngineError::NodeError {
                vertex_id,
                message,
                source,
            } => {
                assert_eq!(vertex_id.0, "generate");
                assert_eq!(message, "no LLM provider configured");
                assert!(source.is_none());
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_node_timeout() {
        let err = EngineError::NodeTimeout(VertexId::from("slow_node"));
        assert!(format!("{}", err).contains("slow_node"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_checkpoint_mismatch() {
        let err = EngineError::checkpoint_mismatch("wf-a", "wf-b");
        assert_eq!(
            err.to_string(),
            "Checkpoint workflow mismatch: expected wf-a, found wf-b"
        );
    }
}
