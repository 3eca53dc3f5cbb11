//! Process-wide cache of compiled graphs keyed by workflow id.
//!
//! Entries never expire. Callers must invalidate after changing a
//! workflow's nodes or connections.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::compiled::{CompileError, CompiledGraph, GraphCompiler};
use super::graph::WorkflowDefinition;

pub struct GraphCache {
    compiler: GraphCompiler,
    graphs: RwLock<HashMap<String, Arc<CompiledGraph>>>,
}

impl GraphCache {
    pub fn new(compiler: GraphCompiler) -> Self {
        Self {
            compiler,
            graphs: RwLock::new(HashMap::new()),
        }
    }

    pub fn compiler(&self) -> &GraphCompiler {
        &self.compiler
    }

    /// Cached graph for a workflow id, if compiled
    pub async fn get(&self, workflow_id: &str) -> Option<Arc<CompiledGraph>> {
        self.graphs.read().await.get(workflow_id).cloned()
    }

    /// Return the cached graph, compiling and caching it on a miss.
    ///
    /// Repeat calls return the same `Arc` until the entry is invalidated.
    /// Failed compilations are not cached.
    pub async fn get_or_compile(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<Arc<CompiledGraph>, CompileError> {
        if let Some(graph) = self.get(&definition.id).await {
            debug!(workflow_id = %definition.id, "Compiled graph cache hit");
            return Ok(graph);
        }

        let mut graphs = self.graphs.write().await;
        if let Some(graph) = graphs.get(&definition.id) {
            return Ok(graph.clone());
        }

        let graph = Arc::new(self.compiler.compile(definition)?);
        graphs.insert(definition.id.clone(), graph.clone());
        Ok(graph)
    }

    /// Drop one workflow's graph, or every graph when `workflow_id` is `None`.
    /// Returns the number of entries removed.
    pub async fn invalidate(&self, workflow_id: Option<&str>) -> usize {
        let mut graphs = self.graphs.write().await;
        let removed = match workflow_id {
            Some(id) => usize::from(graphs.remove(id).is_some()),
            None => {
                let count = graphs.len();
                graphs.clear();
                count
            }
        };
        info!(workflow_id = ?workflow_id, removed, "Compiled graph cache invalidated");
        removed
    }

    pub async fn len(&self) -> usize {
        self.graphs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.graphs.read().await.is_empty()
    }
}
