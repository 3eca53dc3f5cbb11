//! File-based Checkpointer Implementation
//!
//! Stores one checkpoint per thread as a JSON file, optionally compressed
//! with zstd.
//!
//! # Directory Structure
//!
//! ```text
//! checkpoints/
//! ├── 6f1c2c4e-....json[.zst]
//! └── thread-42.json[.zst]
//! ```

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{Checkpoint, Checkpointer};
use crate::engine::error::EngineError;

/// File-based checkpointer that stores checkpoints as JSON files.
///
/// Atomic writes are ensured via temporary file + rename pattern.
#[derive(Debug)]
pub struct FileCheckpointer {
    base_path: PathBuf,
    /// Whether to compress checkpoints with zstd
    compression: bool,
}

impl FileCheckpointer {
    /// Create a new file-based checkpointer rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>, compression: bool) -> Self {
        Self {
            base_path: base_path.into(),
            compression,
        }
    }

    fn extension(&self) -> &'static str {
        if self.compression {
            ".json.zst"
        } else {
            ".json"
        }
    }

    /// Thread ids become file names, so only a conservative character set is accepted.
    fn validate_thread_id(thread_id: &str) -> Result<(), EngineError> {
        let valid = !thread_id.is_empty()
            && !thread_id.starts_with('.')
            && thread_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(EngineError::checkpoint_error(format!(
                "Invalid thread id for file checkpoint: {:?}",
                thread_id
            )))
        }
    }

    /// Get the file path for a thread's checkpoint
    fn checkpoint_path(&self, thread_id: &str) -> Result<PathBuf, EngineError> {
        Self::validate_thread_id(thread_id)?;
        Ok(self
            .base_path
            .join(format!("{}{}", thread_id, self.extension())))
    }

    /// Unique temporary path so concurrent saves never share a temp file
    fn temp_path(&self, thread_id: &str) -> PathBuf {
        self.base_path
            .join(format!(".{}.{}.tmp", thread_id, uuid::Uuid::new_v4()))
    }

    /// Private name a checkpoint is moved to while one caller takes it
    fn claim_path(&self, thread_id: &str) -> PathBuf {
        self.base_path
            .join(format!(".{}.{}.claim", thread_id, uuid::Uuid::new_v4()))
    }

    /// Read and decode a checkpoint file; `None` if it does not exist.
    async fn read_checkpoint(&self, path: &Path) -> Result<Option<Checkpoint>, EngineError> {
        let mut file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EngineError::checkpoint_error(format!(
                    "Failed to open file: {}",
                    e
                )))
            }
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to read file: {}", e)))?;

        let json = if self.compression {
            Self::decompress(&data)?
        } else {
            data
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&json)
            .map_err(|e| EngineError::checkpoint_error(format!("Deserialization failed: {}", e)))?;

        Ok(Some(checkpoint))
    }

    /// Ensure the checkpoint directory exists
    async fn ensure_dir(&self) -> Result<(), EngineError> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to create directory: {}", e)))
    }

    /// Compress data using zstd
    fn compress(data: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3)
            .map_err(|e| EngineError::checkpoint_error(format!("Compression init failed: {}", e)))?;
        encoder
            .write_all(data)
            .map_err(|e| EngineError::checkpoint_error(format!("Compression write failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| EngineError::checkpoint_error(format!("Compression finish failed: {}", e)))
    }

    /// Decompress data using zstd
    fn decompress(data: &[u8]) -> Result<Vec<u8>, EngineError> {
        zstd::stream::decode_all(data)
            .map_err(|e| EngineError::checkpoint_error(format!("Decompression failed: {}", e)))
    }

    /// Recover the thread id from a checkpoint file name
    fn parse_thread_id(&self, path: &Path) -> Option<String> {
        let filename = path.file_name()?.to_str()?;
        if filename.starts_with('.') {
            return None;
        }
        filename
            .strip_suffix(self.extension())
            .map(|id| id.to_string())
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError> {
        let final_path = self.checkpoint_path(&checkpoint.thread_id)?;
        self.ensure_dir().await?;

        let json = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| EngineError::checkpoint_error(format!("Serialization failed: {}", e)))?;

        let data = if self.compression {
            Self::compress(&json)?
        } else {
            json
        };

        let temp_path = self.temp_path(&checkpoint.thread_id);

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to create temp file: {}", e)))?;

        file.write_all(&data)
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to write data: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to sync file: {}", e)))?;

        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to rename file: {}", e)))?;

        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let path = self.checkpoint_path(thread_id)?;
        self.read_checkpoint(&path).await
    }

    // Renaming is atomic, so exactly one concurrent caller claims the file;
    // the others see NotFound.
    async fn take(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let path = self.checkpoint_path(thread_id)?;
        let claim = self.claim_path(thread_id);

        match fs::rename(&path, &claim).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EngineError::checkpoint_error(format!(
                    "Failed to claim file: {}",
                    e
                )))
            }
        }

        match self.read_checkpoint(&claim).await {
            Ok(checkpoint) => {
                fs::remove_file(&claim).await.map_err(|e| {
                    EngineError::checkpoint_error(format!("Failed to delete file: {}", e))
                })?;
                Ok(checkpoint)
            }
            Err(e) => {
                // Put an unreadable checkpoint back rather than lose it
                let _ = fs::rename(&claim, &path).await;
                Err(e)
            }
        }
    }

    async fn delete(&self, thread_id: &str) -> Result<(), EngineError> {
        let path = self.checkpoint_path(thread_id)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::checkpoint_error(format!(
                "Failed to delete file: {}",
                e
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<String>, EngineError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to read directory: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::checkpoint_error(format!("Failed to read entry: {}", e)))?
        {
            if let Some(id) = self.parse_thread_id(&entry.path()) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ExecutionState;
    use tempfile::tempdir;

    fn checkpoint(thread_id: &str) -> Checkpoint {
        let mut state = ExecutionState::new("show all users");
        state.generated_sql = "SELECT * FROM \"User\";".into();
        Checkpoint::new(thread_id, "sql-agent", "approval", state)
    }

    #[tokio::test]
    async fn test_file_checkpointer_save_load() {
        let temp_dir = tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(temp_dir.path(), false);

        checkpointer.save(&checkpoint("t-1")).await.unwrap();
        assert!(temp_dir.path().join("t-1.json").exists());

        let loaded = checkpointer.load("t-1").await.unwrap().unwrap();
        assert_eq!(loaded.workflow_id, "sql-agent");
        assert_eq!(loaded.state.generated_sql, "SELECT * FROM \"User\";");
    }

    #[tokio::test]
    async fn test_file_checkpointer_compression() {
        let temp_dir = tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(temp_dir.path(), true);

        checkpointer.save(&checkpoint("t-1")).await.unwrap();
        assert!(temp_dir.path().join("t-1.json.zst").exists());

        let loaded = checkpointer.load("t-1").await.unwrap().unwrap();
        assert_eq!(loaded.node_id.as_str(), "approval");
    }

    #[tokio::test]
    async fn test_file_checkpointer_missing_thread() {
        let temp_dir = tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(temp_dir.path().join("nested"), false);

        assert!(checkpointer.load("nope").await.unwrap().is_none());
        assert!(checkpointer.list().await.unwrap().is_empty());
        checkpointer.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_checkpointer_list_and_take() {
        let temp_dir = tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(temp_dir.path(), false);

        for id in ["b", "a", "c"] {
            checkpointer.save(&checkpoint(id)).await.unwrap();
        }
        assert_eq!(checkpointer.list().await.unwrap(), vec!["a", "b", "c"]);

        let taken = checkpointer.take("b").await.unwrap();
        assert!(taken.is_some());
        assert_eq!(checkpointer.list().await.unwrap(), vec!["a", "c"]);

        checkpointer.clear().await.unwrap();
        assert!(checkpointer.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_checkpointer_concurrent_take_has_one_winner() {
        let temp_dir = tempdir().unwrap();
        let checkpointer = std::sync::Arc::new(FileCheckpointer::new(temp_dir.path(), false));

        for round in 0..50 {
            checkpointer.save(&checkpoint("t-race")).await.unwrap();

            let first = tokio::spawn({
                let checkpointer = checkpointer.clone();
                async move { checkpointer.take("t-race").await }
            });
            let second = tokio::spawn({
                let checkpointer = checkpointer.clone();
                async move { checkpointer.take("t-race").await }
            });

            let winners = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()]
                .iter()
                .filter(|taken| taken.is_some())
                .count();
            assert_eq!(winners, 1, "round {}", round);
            assert!(checkpointer.load("t-race").await.unwrap().is_none());
        }

        // Claimed files are removed, not left behind
        let mut entries = std::fs::read_dir(temp_dir.path()).unwrap();
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn test_file_checkpointer_overwrite() {
        let temp_dir = tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(temp_dir.path(), false);

        checkpointer.save(&checkpoint("t-1")).await.unwrap();
        let mut second = checkpoint("t-1");
        second.state.attempt_count = 2;
        checkpointer.save(&second).await.unwrap();

        let loaded = checkpointer.load("t-1").await.unwrap().unwrap();
        assert_eq!(loaded.state.attempt_count, 2);
        assert_eq!(checkpointer.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_checkpointer_rejects_path_traversal() {
        let temp_dir = tempdir().unwrap();
        let checkpointer = FileCheckpointer::new(temp_dir.path(), false);

        assert!(checkpointer.save(&checkpoint("../escape")).await.is_err());
        assert!(checkpointer.load("a/b").await.is_err());
        assert!(checkpointer.load("").await.is_err());
    }
}
