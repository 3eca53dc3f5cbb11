//! CompiledGraph: turns a WorkflowDefinition into an executable graph
//!
//! # Overview
//!
//! The compilation process:
//! 1. Resolves every node's kind through the [`NodeRegistry`] (unknown
//!    kinds become pass-through) and parses its typed config
//! 2. Finds the single entry node (`schema-trigger` or `initial`)
//! 3. Groups connections by source and builds one [`Route`] per node
//! 4. Builds the vertex implementation for each node
//!
//! The result is immutable. Cache it with [`GraphCache`](super::cache::GraphCache).
//!
//! # Example
//!
//! ```ignore
//! let definition = WorkflowDefinition::new("hello")
//!     .node("start", "initial")
//!     .node("check", "condition")
//!     .connect("start", "check")
//!     .on_yes("check", END);
//!
//! let graph = GraphCompiler::new(NodeResources::new()).compile(&definition)?;
//! println!("{}", graph.to_mermaid());
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::graph::{Connection, WorkflowDefinition, END, NO_PORT, START, YES_PORT};
use super::node::{NodeConfig, NodeKind, NodeRegistry};
use super::router::{ConditionalEdge, Route};
use super::vertices::{build_vertex, NodeResources};
use crate::engine::vertex::{BoxedVertex, VertexId};
use crate::engine::visualization::{
    render_edge, render_node, render_node_with_class, STYLE_DEFS,
};

/// Errors that can occur during workflow compilation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// No node of an entry kind
    #[error("Workflow '{0}' has no entry node (schema-trigger or initial)")]
    NoEntryNode(String),

    /// More than one node of an entry kind
    #[error("Workflow has several entry nodes: {}", .0.join(", "))]
    AmbiguousEntry(Vec<String>),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// A connection references a node that is not declared
    #[error("Connection {from} -> {to} references unknown node '{missing}'")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },

    #[error("Invalid config for node '{node}': {message}")]
    InvalidNodeConfig { node: String, message: String },
}

impl CompileError {
    fn invalid_config(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidNodeConfig {
            node: node.into(),
            message: message.into(),
        }
    }
}

/// Builds [`CompiledGraph`]s with a shared set of collaborators
#[derive(Debug, Clone, Default)]
pub struct GraphCompiler {
    resources: NodeResources,
    registry: NodeRegistry,
}

impl GraphCompiler {
    pub fn new(resources: NodeResources) -> Self {
        Self {
            resources,
            registry: NodeRegistry::new(),
        }
    }

    /// Use a registry with extra kind aliases
    pub fn with_registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn resources(&self) -> &NodeResources {
        &self.resources
    }

    /// Compile a definition. Pure apart from logging; errors are fatal.
    pub fn compile(&self, definition: &WorkflowDefinition) -> Result<CompiledGraph, CompileError> {
        info!(
            workflow_id = %definition.id,
            nodes = definition.nodes.len(),
            connections = definition.connections.len(),
            "Compiling workflow"
        );

        // Kinds and typed configs
        let mut order: Vec<VertexId> = Vec::with_capacity(definition.nodes.len());
        let mut kinds: HashMap<VertexId, NodeKind> = HashMap::new();
        let mut configs: HashMap<VertexId, NodeConfig> = HashMap::new();

        for node in &definition.nodes {
            if node.id.trim().is_empty() {
                return Err(CompileError::invalid_config(&node.id, "node id must not be empty"));
            }
            if node.id == END || node.id == START {
                return Err(CompileError::invalid_config(
                    &node.id,
                    format!("{} is reserved", node.id),
                ));
            }

            let id = VertexId::from(node.id.as_str());
            if kinds.contains_key(&id) {
                return Err(CompileError::DuplicateNode(node.id.clone()));
            }

            let kind = self.registry.resolve(&node.id, &node.kind);
            let config = NodeConfig::parse(kind, &node.config)
                .map_err(|e| CompileError::invalid_config(&node.id, e.to_string()))?;

            kinds.insert(id.clone(), kind);
            configs.insert(id.clone(), config);
            order.push(id);
        }

        let entry = find_entry(&definition.id, &order, &kinds)?;
        validate_connections(definition, &kinds)?;

        // One route per node
        let mut routes: HashMap<VertexId, Route> = HashMap::new();
        for id in &order {
            let outgoing = definition.outgoing(id.as_str());
            let route = match kinds.get(id) {
                Some(NodeKind::Condition) => branch_route(id, &outgoing),
                _ => plain_route(&outgoing),
            };
            debug!(node = %id, route = ?route, "Route compiled");
            routes.insert(id.clone(), route);
        }

        // Approval retry targets default to the first generate node
        let first_generate = order
            .iter()
            .find(|id| kinds.get(*id) == Some(&NodeKind::SqlGenerate))
            .cloned();

        let attempt_bound = configs
            .values()
            .filter_map(|config| match config {
                NodeConfig::Approval(approval) => approval.max_attempts,
                NodeConfig::Condition(condition) => condition.max_attempts,
                _ => None,
            })
            .fold(self.resources.max_attempts, u32::max)
            .max(1);

        let mut vertices: HashMap<VertexId, BoxedVertex> = HashMap::new();
        for id in &order {
            let Some(config) = configs.remove(id) else {
                continue;
            };

            let retry_target = match &config {
                NodeConfig::Approval(approval) => match approval.retry_node.as_deref() {
                    Some(retry) if kinds.contains_key(&VertexId::from(retry)) => {
                        Some(VertexId::from(retry))
                    }
                    Some(retry) => {
                        return Err(CompileError::invalid_config(
                            id.as_str(),
                            format!("retryNode '{}' is not a node of this workflow", retry),
                        ));
                    }
                    None => first_generate.clone(),
                },
                _ => None,
            };

            vertices.insert(
                id.clone(),
                build_vertex(id.clone(), config, &self.resources, retry_target),
            );
        }

        info!(workflow_id = %definition.id, entry = %entry, "Workflow compiled");

        Ok(CompiledGraph {
            workflow_id: definition.id.clone(),
            name: definition.name.clone(),
            entry,
            order,
            vertices,
            routes,
            kinds,
            attempt_bound,
        })
    }
}

fn find_entry(
    workflow_id: &str,
    order: &[VertexId],
    kinds: &HashMap<VertexId, NodeKind>,
) -> Result<VertexId, CompileError> {
    let entries: Vec<&VertexId> = order
        .iter()
        .filter(|id| kinds.get(*id).is_some_and(NodeKind::is_entry))
        .collect();

    match entries.as_slice() {
        [] => Err(CompileError::NoEntryNode(workflow_id.to_string())),
        [entry] => Ok((*entry).clone()),
        many => Err(CompileError::AmbiguousEntry(
            many.iter().map(|id| id.to_string()).collect(),
        )),
    }
}

fn validate_connections(
    definition: &WorkflowDefinition,
    kinds: &HashMap<VertexId, NodeKind>,
) -> Result<(), CompileError> {
    for connection in &definition.connections {
        let unknown = |missing: &str| CompileError::UnknownNode {
            from: connection.from_node_id.clone(),
            to: connection.to_node_id.clone(),
            missing: missing.to_string(),
        };

        if !kinds.contains_key(&VertexId::from(connection.from_node_id.as_str())) {
            return Err(unknown(&connection.from_node_id));
        }
        if !connection.targets_end()
            && !kinds.contains_key(&VertexId::from(connection.to_node_id.as_str()))
        {
            return Err(unknown(&connection.to_node_id));
        }
    }
    Ok(())
}

fn target_of(connection: &Connection) -> Option<VertexId> {
    if connection.targets_end() {
        None
    } else {
        Some(VertexId::from(connection.to_node_id.as_str()))
    }
}

/// The highest-priority connection leaving through `port`
fn first_on_port<'a>(id: &VertexId, outgoing: &[&'a Connection], port: &str) -> Option<&'a Connection> {
    let mut matching: Vec<&'a Connection> = outgoing
        .iter()
        .copied()
        .filter(|c| c.from_output == port)
        .collect();
    matching.sort_by_key(|c| c.priority);
    if matching.len() > 1 {
        warn!(node = %id, port, "Several connections on one branch, using the first");
    }
    matching.first().copied()
}

/// Yes/no router for a condition node
fn branch_route(id: &VertexId, outgoing: &[&Connection]) -> Route {
    let yes = first_on_port(id, outgoing, YES_PORT);
    let no = first_on_port(id, outgoing, NO_PORT);

    let ignored = outgoing
        .iter()
        .filter(|c| c.from_output != YES_PORT && c.from_output != NO_PORT)
        .count();
    if ignored > 0 {
        warn!(node = %id, ignored, "Condition node connections without a yes/no output are ignored");
    }

    if yes.is_none() && no.is_none() {
        warn!(node = %id, "Condition node has no yes/no connections, the run ends there");
        return Route::End;
    }

    Route::Branch {
        yes: yes.and_then(target_of),
        no: no.and_then(target_of),
    }
}

/// Direct edge for a single unguarded connection, guarded router otherwise
fn plain_route(outgoing: &[&Connection]) -> Route {
    match outgoing {
        [] => Route::End,
        [only] if only.condition.is_none() => match target_of(only) {
            Some(target) => Route::Direct(target),
            None => Route::End,
        },
        many => Route::conditional(
            many.iter()
                .map(|c| ConditionalEdge {
                    target: target_of(c),
                    condition: c.condition.clone(),
                    priority: c.priority,
                })
                .collect(),
        ),
    }
}

/// An executable workflow graph
pub struct CompiledGraph {
    workflow_id: String,
    name: String,
    entry: VertexId,
    /// Declaration order, kept for stable diagrams
    order: Vec<VertexId>,
    vertices: HashMap<VertexId, BoxedVertex>,
    routes: HashMap<VertexId, Route>,
    kinds: HashMap<VertexId, NodeKind>,
    /// Largest retry bound of any node
    attempt_bound: u32,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("workflow_id", &self.workflow_id)
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("nodes", &self.order)
            .field("routes", &self.routes)
            .field("attempt_bound", &self.attempt_bound)
            .finish()
    }
}

impl CompiledGraph {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &VertexId {
        &self.entry
    }

    /// Node ids in declaration order
    pub fn node_ids(&self) -> &[VertexId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn vertex(&self, id: &VertexId) -> Option<&BoxedVertex> {
        self.vertices.get(id)
    }

    pub fn route(&self, id: &VertexId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn kind(&self, id: &VertexId) -> Option<NodeKind> {
        self.kinds.get(id).copied()
    }

    /// Largest retry bound enforced by any node of this graph
    pub fn attempt_bound(&self) -> u32 {
        self.attempt_bound
    }

    /// Steps a single drive needs to exhaust every retry: one pass over the
    /// graph per attempt, plus the pass that halts.
    pub fn step_budget(&self) -> usize {
        (self.attempt_bound as usize + 1).saturating_mul(self.len() + 1)
    }

    pub fn is_suspend_point(&self, id: &VertexId) -> bool {
        self.kind(id).is_some_and(|kind| kind.is_suspend_point())
    }

    /// Swap the implementation of an existing node, keeping its kind and
    /// route. Returns the previous vertex, or `None` if the id is unknown.
    pub fn replace_vertex(&mut self, vertex: BoxedVertex) -> Option<BoxedVertex> {
        let id = vertex.id().clone();
        if !self.vertices.contains_key(&id) {
            return None;
        }
        self.vertices.insert(id, vertex)
    }

    /// Generate a Mermaid flowchart of the graph.
    ///
    /// # Example Output
    ///
    /// ```text
    /// graph TD
    ///     START([START])
    ///     schema[(schema)]
    ///     check{check}
    ///     END([END])
    ///
    ///     START --> schema
    ///     schema --> check
    ///     check -. "yes" .-> END
    /// ```
    pub fn to_mermaid(&self) -> String {
        self.render_mermaid(None)
    }

    /// Mermaid diagram with the node where a run is suspended highlighted
    pub fn to_mermaid_suspended_at(&self, node: &VertexId) -> String {
        self.render_mermaid(Some(node))
    }

    fn render_mermaid(&self, suspended: Option<&VertexId>) -> String {
        let start = VertexId::from(START);
        let end = VertexId::from(END);

        let mut edges: Vec<String> = vec![render_edge(&start, &self.entry, None)];
        let mut reaches_end = false;
        for id in &self.order {
            let Some(route) = self.routes.get(id) else {
                continue;
            };
            let route_edges = route.edges();
            if route_edges.is_empty() {
                reaches_end = true;
                edges.push(render_edge(id, &end, None));
            }
            for (target, label) in route_edges {
                let target = target.unwrap_or_else(|| {
                    reaches_end = true;
                    end.clone()
                });
                edges.push(render_edge(id, &target, label.as_deref()));
            }
        }

        let mut seen = HashSet::new();
        edges.retain(|edge| seen.insert(edge.clone()));

        let mut output = String::new();
        let _ = writeln!(output, "graph TD");
        let _ = writeln!(output, "{}", render_node(&start, None));
        for id in &self.order {
            let kind = self.kind(id);
            let line = match suspended {
                Some(node) if node == id => render_node_with_class(id, kind, "suspended"),
                _ => render_node(id, kind),
            };
            let _ = writeln!(output, "{}", line);
        }
        if reaches_end {
            let _ = writeln!(output, "{}", render_node(&end, None));
        }

        output.push('\n');
        for edge in edges {
            let _ = writeln!(output, "{}", edge);
        }

        if suspended.is_some() {
            output.push_str(STYLE_DEFS);
        }
        output
    }
}
