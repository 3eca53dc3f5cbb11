//! In-memory workflow store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{validate_workflow_id, WorkflowStore};
use crate::error::StoreError;
use crate::workflow::graph::WorkflowDefinition;

#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: RwLock<HashMap<String, WorkflowDefinition>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `definitions`
    pub fn with_workflows(definitions: impl IntoIterator<Item = WorkflowDefinition>) -> Self {
        let workflows = definitions
            .into_iter()
            .map(|definition| (definition.id.clone(), definition))
            .collect();
        Self {
            workflows: RwLock::new(workflows),
        }
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self.workflows.read().await.get(workflow_id).cloned())
    }

    async fn put(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        validate_workflow_id(&definition.id)?;
        self.workflows
            .write()
            .await
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError> {
        Ok(self.workflows.write().await.remove(workflow_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.workflows.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
