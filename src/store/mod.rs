//! Workflow definition storage
//!
//! The executor looks workflows up by id through a [`WorkflowStore`].
//! Two implementations ship with the crate:
//!
//! - [`MemoryWorkflowStore`]: in-process map, for tests and embedding
//! - [`FileWorkflowStore`]: one JSON or YAML file per workflow

mod file;
mod memory;

pub use file::FileWorkflowStore;
pub use memory::MemoryWorkflowStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::workflow::graph::WorkflowDefinition;

/// Source of workflow definitions
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Load a workflow by id
    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Insert or replace a workflow
    async fn put(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;

    /// Remove a workflow; returns whether it existed
    async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError>;

    /// All workflow ids, sorted
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Workflow ids must be usable as file names.
pub(crate) fn validate_workflow_id(workflow_id: &str) -> Result<(), StoreError> {
    let valid = !workflow_id.is_empty()
        && !workflow_id.starts_with('.')
        && workflow_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(workflow_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_workflow_id() {
        assert!(validate_workflow_id("sql-agent").is_ok());
        assert!(validate_workflow_id("team_1.v2").is_ok());
        assert!(validate_workflow_id("").is_err());
        assert!(validate_workflow_id(".hidden").is_err());
        assert!(validate_workflow_id("../etc/passwd").is_err());
        assert!(validate_workflow_id("a b").is_err());
    }
}
