//! SQLite-based Checkpointer Implementation
//!
//! Stores one checkpoint row per thread in a SQLite database. Supports both
//! file-based and in-memory databases.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS checkpoints (
//!     thread_id TEXT PRIMARY KEY,
//!     workflow_id TEXT NOT NULL,
//!     node_id TEXT NOT NULL,
//!     data BLOB NOT NULL,
//!     created_at TEXT NOT NULL
//! );
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sqlflow::engine::checkpoint::SqliteCheckpointer;
//!
//! let checkpointer = SqliteCheckpointer::new("./checkpoints.db").await?;
//! let checkpointer = SqliteCheckpointer::new(":memory:").await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio_rusqlite::Connection;

use super::{Checkpoint, Checkpointer};
use crate::engine::error::EngineError;

/// SQLite-based checkpointer for durable suspended executions.
#[derive(Debug)]
pub struct SqliteCheckpointer {
    /// Async SQLite connection
    conn: Arc<Connection>,
    /// Whether to use compression
    compression: bool,
}

impl SqliteCheckpointer {
    /// Create a new SQLite checkpointer.
    ///
    /// `path` is a database file path, or `:memory:` for an in-memory database.
    pub async fn new(path: impl AsRef<str>) -> Result<Self, EngineError> {
        Self::with_compression(path, false).await
    }

    /// Create a new SQLite checkpointer with compression option.
    pub async fn with_compression(
        path: impl AsRef<str>,
        compression: bool,
    ) -> Result<Self, EngineError> {
        let path = path.as_ref().to_string();

        let conn = Connection::open(&path)
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to open SQLite: {}", e)))?;

        conn.call(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS checkpoints (
                    thread_id TEXT PRIMARY KEY,
                    workflow_id TEXT NOT NULL,
                    node_id TEXT NOT NULL,
                    data BLOB NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_checkpoints_workflow
                    ON checkpoints(workflow_id);
                "#,
            )?;
            Ok(())
        })
        .await
        .map_err(|e| EngineError::checkpoint_error(format!("Failed to create schema: {}", e)))?;

        Ok(Self {
            conn: Arc::new(conn),
            compression,
        })
    }

    /// Compress data using zstd
    fn compress(data: &[u8]) -> Result<Vec<u8>, EngineError> {
        use std::io::Write;
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3)
            .map_err(|e| EngineError::checkpoint_error(format!("Compression init failed: {}", e)))?;
        encoder
            .write_all(data)
            .map_err(|e| EngineError::checkpoint_error(format!("Compression write failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| EngineError::checkpoint_error(format!("Compression finish failed: {}", e)))
    }

    fn decode(&self, data: Vec<u8>) -> Result<Checkpoint, EngineError> {
        let json = if self.compression {
            zstd::stream::decode_all(data.as_slice())
                .map_err(|e| EngineError::checkpoint_error(format!("Decompression failed: {}", e)))?
        } else {
            data
        };

        serde_json::from_slice(&json)
            .map_err(|e| EngineError::checkpoint_error(format!("Deserialization failed: {}", e)))
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError> {
        let json = serde_json::to_vec(checkpoint)
            .map_err(|e| EngineError::checkpoint_error(format!("Serialization failed: {}", e)))?;

        let data = if self.compression {
            Self::compress(&json)?
        } else {
            json
        };

        let thread_id = checkpoint.thread_id.clone();
        let workflow_id = checkpoint.workflow_id.clone();
        let node_id = checkpoint.node_id.to_string();
        let created_at = checkpoint.timestamp.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO checkpoints (thread_id, workflow_id, node_id, data, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    rusqlite::params![thread_id, workflow_id, node_id, data, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to save checkpoint: {}", e)))?;

        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let thread_id = thread_id.to_string();

        let result = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT data FROM checkpoints WHERE thread_id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![thread_id])?;

                if let Some(row) = rows.next()? {
                    let data: Vec<u8> = row.get(0)?;
                    Ok(Some(data))
                } else {
                    Ok(None)
                }
            })
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to load checkpoint: {}", e)))?;

        result.map(|data| self.decode(data)).transpose()
    }

    async fn delete(&self, thread_id: &str) -> Result<(), EngineError> {
        let thread_id = thread_id.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM checkpoints WHERE thread_id = ?1",
                    rusqlite::params![thread_id],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to delete checkpoint: {}", e)))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, EngineError> {
        self.conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT thread_id FROM checkpoints ORDER BY thread_id ASC")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                Ok(ids)
            })
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to list checkpoints: {}", e)))
    }

    async fn take(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let thread_id = thread_id.to_string();

        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let data: Option<Vec<u8>> = {
                    let mut stmt = tx.prepare("SELECT data FROM checkpoints WHERE thread_id = ?1")?;
                    let mut rows = stmt.query(rusqlite::params![thread_id])?;
                    match rows.next()? {
                        Some(row) => Some(row.get(0)?),
                        None => None,
                    }
                };
                if data.is_some() {
                    tx.execute(
                        "DELETE FROM checkpoints WHERE thread_id = ?1",
                        rusqlite::params![thread_id],
                    )?;
                }
                tx.commit()?;
                Ok(data)
            })
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to take checkpoint: {}", e)))?;

        result.map(|data| self.decode(data)).transpose()
    }
}
