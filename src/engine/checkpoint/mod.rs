//! Checkpoint storage for suspended executions
//!
//! A checkpoint is written when an execution reaches a suspend point and is
//! consumed when that execution resumes. Checkpoints are keyed by thread id;
//! each thread has at most one live checkpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Checkpointer                  │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐   │
//! │  │  Memory  │  │   File   │  │  SQLite  │   │
//! │  └──────────┘  └──────────┘  └──────────┘   │
//! │        └─────────────┼─────────────┘         │
//! │                      ▼                        │
//! │     Checkpoint { thread_id, node_id, state }  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sqlflow::engine::checkpoint::{CheckpointerConfig, create_checkpointer};
//!
//! let checkpointer = create_checkpointer(CheckpointerConfig::File {
//!     path: PathBuf::from("./checkpoints"),
//!     compression: true,
//! })
//! .await?;
//!
//! checkpointer.save(&checkpoint).await?;
//! let resumed = checkpointer.take("thread-1").await?;
//! ```

mod file;
#[cfg(feature = "checkpointer-sqlite")]
mod sqlite;

pub use file::FileCheckpointer;
#[cfg(feature = "checkpointer-sqlite")]
pub use sqlite::SqliteCheckpointer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::error::EngineError;
use super::vertex::VertexId;
use crate::state::ExecutionState;

/// Everything needed to resume a suspended execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Execution thread this checkpoint belongs to
    pub thread_id: String,

    /// Workflow whose compiled graph produced the checkpoint
    pub workflow_id: String,

    /// Vertex at which execution is suspended
    pub node_id: VertexId,

    /// State at the moment of suspension
    pub state: ExecutionState,

    /// When this checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// Optional metadata for debugging or external tools
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        workflow_id: impl Into<String>,
        node_id: impl Into<VertexId>,
        state: ExecutionState,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            workflow_id: workflow_id.into(),
            node_id: node_id.into(),
            state,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Add metadata to this checkpoint
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Keyed checkpoint persistence.
///
/// Implementations must be safe for concurrent use by many threads; writes
/// for one thread id never affect another.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Save (or replace) the checkpoint for `checkpoint.thread_id`.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError>;

    /// Load the checkpoint for a thread, if one exists.
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError>;

    /// Delete the checkpoint for a thread. Deleting a missing key is not an error.
    async fn delete(&self, thread_id: &str) -> Result<(), EngineError>;

    /// List thread ids with a live checkpoint, sorted ascending.
    async fn list(&self) -> Result<Vec<String>, EngineError>;

    /// Load and remove a checkpoint.
    async fn take(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let checkpoint = self.load(thread_id).await?;
        if checkpoint.is_some() {
            self.delete(thread_id).await?;
        }
        Ok(checkpoint)
    }

    /// Remove every checkpoint.
    async fn clear(&self) -> Result<(), EngineError> {
        for thread_id in self.list().await? {
            self.delete(&thread_id).await?;
        }
        Ok(())
    }
}

/// Configuration for creating checkpointers.
///
/// Use with [`create_checkpointer`] to instantiate the appropriate backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CheckpointerConfig {
    /// In-memory checkpointing (single process, not durable)
    #[default]
    Memory,

    /// File-based checkpointing
    File {
        /// Directory to store checkpoint files
        path: PathBuf,
        /// Whether to compress checkpoint data (uses zstd)
        compression: bool,
    },

    /// SQLite-based checkpointing (requires `checkpointer-sqlite` feature)
    #[cfg(feature = "checkpointer-sqlite")]
    Sqlite {
        /// Path to the SQLite database file, or `:memory:` for in-memory
        path: String,
    },
}

/// In-memory checkpointer.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    checkpoints: tokio::sync::RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointer {
    /// Create a new in-memory checkpointer
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), EngineError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.remove(thread_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, EngineError> {
        let checkpoints = self.checkpoints.read().await;
        let mut ids: Vec<String> = checkpoints.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    // Single write lock so concurrent resumes of one thread cannot both win.
    async fn take(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let mut checkpoints = self.checkpoints.write().await;
        Ok(checkpoints.remove(thread_id))
    }
}

/// Create a checkpointer from configuration.
///
/// # Example
///
/// ```ignore
/// let config = CheckpointerConfig::File {
///     path: PathBuf::from("./checkpoints"),
///     compression: true,
/// };
/// let checkpointer = create_checkpointer(config).await?;
/// ```
pub async fn create_checkpointer(
    config: CheckpointerConfig,
) -> Result<Arc<dyn Checkpointer>, EngineError> {
    match config {
        CheckpointerConfig::Memory => Ok(Arc::new(MemoryCheckpointer::new())),

        CheckpointerConfig::File { path, compression } => {
            Ok(Arc::new(FileCheckpointer::new(path, compression)))
        }

        #[cfg(feature = "checkpointer-sqlite")]
        CheckpointerConfig::Sqlite { path } => {
            let checkpointer = SqliteCheckpointer::new(&path).await?;
            Ok(Arc::new(checkpointer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(MemoryCheckpointer: Send, Sync);

    fn checkpoint(thread_id: &str) -> Checkpoint {
        Checkpoint::new(
            thread_id,
            "sql-agent",
            "approval",
            ExecutionState::new("show all users"),
        )
    }

    #[test]
    fn test_checkpoint_creation() {
        let checkpoint = checkpoint("t-1").with_metadata("attempt", "1");

        assert_eq!(checkpoint.thread_id, "t-1");
        assert_eq!(checkpoint.workflow_id, "sql-agent");
        assert_eq!(checkpoint.node_id, VertexId::from("approval"));
        assert_eq!(checkpoint.metadata.get("attempt"), Some(&"1".to_string()));
    }

    #[test]
    fn test_checkpoint_serializes_camel_case() {
        let value = serde_json::to_value(checkpoint("t-1")).unwrap();
        assert_eq!(value["threadId"], "t-1");
        assert_eq!(value["nodeId"], "approval");
        assert_eq!(value["state"]["userQuery"], "show all users");
    }

    #[tokio::test]
    async fn test_memory_checkpointer_save_load() {
        let checkpointer = MemoryCheckpointer::new();
        checkpointer.save(&checkpoint("t-1")).await.unwrap();

        let loaded = checkpointer.load("t-1").await.unwrap().unwrap();
        assert_eq!(loaded.node_id.as_str(), "approval");
        assert!(checkpointer.load("t-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_checkpointer_take_removes() {
        let checkpointer = MemoryCheckpointer::new();
        checkpointer.save(&checkpoint("t-1")).await.unwrap();

        assert!(checkpointer.take("t-1").await.unwrap().is_some());
        assert!(checkpointer.take("t-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_checkpointer_list_sorted() {
        let checkpointer = MemoryCheckpointer::new();
        for id in ["t-3", "t-1", "t-2"] {
            checkpointer.save(&checkpoint(id)).await.unwrap();
        }

        assert_eq!(checkpointer.list().await.unwrap(), vec!["t-1", "t-2", "t-3"]);
    }

    #[tokio::test]
    async fn test_memory_checkpointer_delete_and_clear() {
        let checkpointer = MemoryCheckpointer::new();
        for id in ["t-1", "t-2"] {
            checkpointer.save(&checkpoint(id)).await.unwrap();
        }

        checkpointer.delete("t-1").await.unwrap();
        checkpointer.delete("missing").await.unwrap();
        assert_eq!(checkpointer.list().await.unwrap(), vec!["t-2"]);

        checkpointer.clear().await.unwrap();
        assert!(checkpointer.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_memory_checkpointer() {
        let checkpointer = create_checkpointer(CheckpointerConfig::default())
            .await
            .unwrap();
        checkpointer.save(&checkpoint("t-1")).await.unwrap();
        assert_eq!(checkpointer.list().await.unwrap().len(), 1);
    }
}
