//! File-based workflow store
//!
//! # Directory Structure
//!
//! ```text
//! workflows/
//! ├── sql-agent.json
//! ├── reporting.yaml
//! └── nightly.yml
//! ```
//!
//! Lookups try `.json`, then `.yaml`, then `.yml`. Writes always produce
//! JSON through a temporary file and a rename.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{validate_workflow_id, WorkflowStore};
use crate::error::StoreError;
use crate::workflow::graph::WorkflowDefinition;

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

#[derive(Debug, Clone)]
pub struct FileWorkflowStore {
    dir: PathBuf,
}

impl FileWorkflowStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, workflow_id: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", workflow_id, extension))
    }

    fn parse(path: &Path, extension: &str, text: &str) -> Result<WorkflowDefinition, StoreError> {
        let parse_error = |message: String| StoreError::Parse {
            path: path.display().to_string(),
            message,
        };
        if extension == "json" {
            WorkflowDefinition::from_json(text).map_err(|e| parse_error(e.to_string()))
        } else {
            WorkflowDefinition::from_yaml(text).map_err(|e| parse_error(e.to_string()))
        }
    }
}

#[async_trait]
impl WorkflowStore for FileWorkflowStore {
    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowDefinition>, StoreError> {
        validate_workflow_id(workflow_id)?;

        for extension in EXTENSIONS {
            let path = self.path(workflow_id, extension);
            let text = match fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let mut definition = Self::parse(&path, extension, &text)?;
            if definition.id.is_empty() {
                definition.id = workflow_id.to_string();
            } else if definition.id != workflow_id {
                return Err(StoreError::Parse {
                    path: path.display().to_string(),
                    message: format!(
                        "workflow id '{}' does not match file name '{}'",
                        definition.id, workflow_id
                    ),
                });
            }
            if definition.name.is_empty() {
                definition.name = definition.id.clone();
            }

            debug!(workflow_id, path = %path.display(), "Workflow loaded");
            return Ok(Some(definition));
        }

        Ok(None)
    }

    async fn put(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        validate_workflow_id(&definition.id)?;
        fs::create_dir_all(&self.dir).await?;

        let json = definition.to_json().map_err(|e| StoreError::Parse {
            path: self.path(&definition.id, "json").display().to_string(),
            message: e.to_string(),
        })?;

        let temp_path = self
            .dir
            .join(format!(".{}.{}.tmp", definition.id, uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, self.path(&definition.id, "json")).await?;

        // JSON wins on lookup; YAML copies are stale now.
        for extension in &EXTENSIONS[1..] {
            match fs::remove_file(self.path(&definition.id, extension)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError> {
        validate_workflow_id(workflow_id)?;

        let mut existed = false;
        for extension in EXTENSIONS {
            match fs::remove_file(self.path(workflow_id, extension)).await {
                Ok(()) => existed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(existed)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let (Some(stem), Some(extension)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|e| e.to_str()),
            ) else {
                continue;
            };
            if EXTENSIONS.contains(&extension) && validate_workflow_id(stem).is_ok() {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
