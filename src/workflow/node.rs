//! Node kinds and typed node configuration.
//!
//! Definitions carry node kinds as strings and configs as loose key/value
//! maps. The [`NodeRegistry`] resolves kind strings to the closed
//! [`NodeKind`] set once, at compile time, and [`NodeConfig::parse`] turns
//! each config map into a typed struct.
//!
//! # Node Kinds
//!
//! - **SchemaTrigger**: fetches table/column/enum metadata (entry node)
//! - **SqlGenerate**: asks the language model for SQL
//! - **SqlExecute**: runs the SQL and summarizes the result
//! - **Approval**: suspends for a human decision
//! - **Condition**: evaluates a predicate into `conditionResult`
//! - **PassThrough** / **Initial**: identity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use super::condition::{Condition, ConditionOperator};

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    SchemaTrigger,
    SqlGenerate,
    SqlExecute,
    Approval,
    Condition,
    #[default]
    PassThrough,
    Initial,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::SchemaTrigger,
        NodeKind::SqlGenerate,
        NodeKind::SqlExecute,
        NodeKind::Approval,
        NodeKind::Condition,
        NodeKind::PassThrough,
        NodeKind::Initial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::SchemaTrigger => "schema-trigger",
            NodeKind::SqlGenerate => "sql-generate",
            NodeKind::SqlExecute => "sql-execute",
            NodeKind::Approval => "approval",
            NodeKind::Condition => "condition",
            NodeKind::PassThrough => "pass-through",
            NodeKind::Initial => "initial",
        }
    }

    /// Kinds that may start a workflow
    pub fn is_entry(&self) -> bool {
        matches!(self, NodeKind::SchemaTrigger | NodeKind::Initial)
    }

    /// Kinds that pause execution for an external decision
    pub fn is_suspend_point(&self) -> bool {
        matches!(self, NodeKind::Approval)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps kind strings to [`NodeKind`].
///
/// Lookup is case-insensitive and treats `_` and `-` alike, so
/// `sql_generate`, `SQL-GENERATE` and `sql-generate` are the same kind.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    kinds: HashMap<String, NodeKind>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        let mut registry = Self {
            kinds: HashMap::new(),
        };
        for kind in NodeKind::ALL {
            registry.register(kind.as_str(), kind);
        }
        registry.register("passthrough", NodeKind::PassThrough);
        registry.register("schema", NodeKind::SchemaTrigger);
        registry
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(name: &str) -> String {
        name.trim().to_ascii_lowercase().replace('_', "-")
    }

    /// Register an additional name for a kind.
    pub fn register(&mut self, name: &str, kind: NodeKind) {
        self.kinds.insert(Self::normalize(name), kind);
    }

    /// Look up a kind string.
    pub fn lookup(&self, name: &str) -> Option<NodeKind> {
        self.kinds.get(&Self::normalize(name)).copied()
    }

    /// Resolve a node's kind, degrading unknown kinds to pass-through.
    pub fn resolve(&self, node_id: &str, name: &str) -> NodeKind {
        self.lookup(name).unwrap_or_else(|| {
            warn!(node = node_id, kind = name, "Unknown node kind, treating as pass-through");
            NodeKind::PassThrough
        })
    }
}

/// Schema node settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaNodeConfig {
    /// Database target; falls back to the process-wide default
    pub connection_string: Option<String>,
}

/// SQL generation settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqlGenerateNodeConfig {
    /// Model override for this node
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

/// SQL execution settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqlExecuteNodeConfig {
    pub connection_string: Option<String>,
    /// Rows shown to the model when summarizing a result
    pub sample_rows: usize,
}

impl Default for SqlExecuteNodeConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            sample_rows: 20,
        }
    }
}

pub const DEFAULT_APPROVAL_QUESTION: &str = "Do you approve this SQL query and its results?";

/// Approval settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalNodeConfig {
    pub question: String,
    /// Node to re-enter after a rejection; defaults to the first SQL generate node
    pub retry_node: Option<String>,
    pub max_attempts: Option<u32>,
}

impl Default for ApprovalNodeConfig {
    fn default() -> Self {
        Self {
            question: DEFAULT_APPROVAL_QUESTION.to_string(),
            retry_node: None,
            max_attempts: None,
        }
    }
}

/// Condition settings: the predicate keys plus an optional attempt bound
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionNodeConfig {
    pub field: Option<String>,
    pub operator: Option<String>,
    pub value: Option<Value>,
    pub max_attempts: Option<u32>,
}

impl ConditionNodeConfig {
    /// The predicate, if a field is configured. A missing operator means `exists`.
    pub fn condition(&self) -> Option<Condition> {
        let field = self.field.as_deref().filter(|f| !f.is_empty())?;
        let operator = self
            .operator
            .as_deref()
            .map(ConditionOperator::from)
            .unwrap_or(ConditionOperator::Exists);
        Some(Condition {
            field: field.to_string(),
            operator,
            value: self.value.clone(),
        })
    }
}

/// Typed config for a resolved node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Schema(SchemaNodeConfig),
    SqlGenerate(SqlGenerateNodeConfig),
    SqlExecute(SqlExecuteNodeConfig),
    Approval(ApprovalNodeConfig),
    Condition(ConditionNodeConfig),
    PassThrough,
}

impl NodeConfig {
    /// Parse a config map for the given kind.
    ///
    /// Unknown keys are ignored; keys with the wrong type are an error.
    pub fn parse(kind: NodeKind, config: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(config.clone());
        Ok(match kind {
            NodeKind::SchemaTrigger => NodeConfig::Schema(serde_json::from_value(value)?),
            NodeKind::SqlGenerate => NodeConfig::SqlGenerate(serde_json::from_value(value)?),
            NodeKind::SqlExecute => NodeConfig::SqlExecute(serde_json::from_value(value)?),
            NodeKind::Approval => NodeConfig::Approval(serde_json::from_value(value)?),
            NodeKind::Condition => NodeConfig::Condition(serde_json::from_value(value)?),
            NodeKind::PassThrough | NodeKind::Initial => NodeConfig::PassThrough,
        })
    }
}
