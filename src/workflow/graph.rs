//! Workflow definitions and the builder DSL.
//!
//! A [`WorkflowDefinition`] is the declarative input to the compiler: a flat
//! list of nodes plus a flat list of connections between them. Definitions
//! load from JSON or YAML documents (camelCase keys) or are assembled with
//! the fluent builder:
//!
//! ```ignore
//! let definition = WorkflowDefinition::new("sql-agent")
//!     .node("schema", "schema-trigger")
//!     .node("generate", "sql-generate")
//!     .connect("schema", "generate");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::condition::Condition;

/// Sentinel target for connections that explicitly terminate the run.
pub const END: &str = "END";

/// Marker drawn before the entry node in diagrams; not a valid node id.
pub const START: &str = "START";

/// Default output/input port name
pub const MAIN_PORT: &str = "main";

/// Output port taken by a condition node when its predicate holds
pub const YES_PORT: &str = "yes";

/// Output port taken by a condition node when its predicate fails
pub const NO_PORT: &str = "no";

fn main_port() -> String {
    MAIN_PORT.to_string()
}

/// A declared unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique within the workflow
    pub id: String,

    /// Node kind string, e.g. `sql-generate`. Unknown kinds compile to pass-through.
    #[serde(alias = "type")]
    pub kind: String,

    /// Kind-specific settings
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            config: Map::new(),
        }
    }

    /// Set a config key
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from_node_id: String,

    /// Target node id, or [`END`]
    pub to_node_id: String,

    /// `main` for ordinary nodes; `yes`/`no` for condition nodes
    #[serde(default = "main_port")]
    pub from_output: String,

    #[serde(default = "main_port")]
    pub to_input: String,

    /// Guard evaluated against the state when the source has several connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    /// Lower values are evaluated first
    #[serde(default)]
    pub priority: i32,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_node_id: from.into(),
            to_node_id: to.into(),
            from_output: main_port(),
            to_input: main_port(),
            condition: None,
            priority: 0,
        }
    }

    pub fn from_output(mut self, output: impl Into<String>) -> Self {
        self.from_output = output.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether this connection explicitly terminates the run
    pub fn targets_end(&self) -> bool {
        self.to_node_id == END
    }
}

/// Declarative workflow: nodes plus connections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Workflow identity; also the compiled-graph cache key
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,

    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl WorkflowDefinition {
    /// Create an empty definition.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ..Default::default()
        }
    }

    /// Set the workflow name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a node with an empty config.
    pub fn node(self, id: impl Into<String>, kind: impl Into<String>) -> Self {
        self.add_node(NodeDefinition::new(id, kind))
    }

    /// Add a fully specified node.
    pub fn add_node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add an unconditional `main` connection.
    pub fn connect(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_connection(Connection::new(from, to))
    }

    /// Add the `yes` branch of a condition node.
    pub fn on_yes(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_connection(Connection::new(from, to).from_output(YES_PORT))
    }

    /// Add the `no` branch of a condition node.
    pub fn on_no(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_connection(Connection::new(from, to).from_output(NO_PORT))
    }

    /// Add a guarded connection.
    pub fn connect_when(
        self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: Condition,
        priority: i32,
    ) -> Self {
        self.add_connection(
            Connection::new(from, to)
                .with_condition(condition)
                .with_priority(priority),
        )
    }

    pub fn add_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Look up a node by id
    pub fn get_node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing connections of a node, in declaration order
    pub fn outgoing(&self, id: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.from_node_id == id)
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::condition::ConditionOperator;

    #[test]
    fn test_builder() {
        let definition = WorkflowDefinition::new("wf")
            .name("Demo")
            .node("start", "initial")
            .add_node(NodeDefinition::new("check", "condition").with_config("field", "error"))
            .connect("start", "check")
            .on_yes("check", END)
            .on_no("check", "start");

        assert_eq!(definition.name, "Demo");
        assert_eq!(definition.nodes.len(), 2);
        assert_eq!(definition.get_node("check").unwrap().config["field"], "error");
        let outgoing = definition.outgoing("check");
        assert_eq!(outgoing.len(), 2);
        assert!(outgoing[0].targets_end());
        assert_eq!(outgoing[1].from_output, "no");
    }

    #[test]
    fn test_from_json_defaults() {
        let json = r#"{
            "id": "wf-1",
            "nodes": [
                {"id": "a", "kind": "initial"},
                {"id": "b", "type": "pass-through", "config": {"x": 1}}
            ],
            "connections": [
                {"fromNodeId": "a", "toNodeId": "b"},
                {"fromNodeId": "b", "toNodeId": "END", "priority": 2,
                 "condition": {"field": "approved", "operator": "eq", "value": true}}
            ]
        }"#;

        let definition = WorkflowDefinition::from_json(json).unwrap();
        assert_eq!(definition.nodes[1].kind, "pass-through");
        assert_eq!(definition.connections[0].from_output, "main");
        assert_eq!(definition.connections[0].to_input, "main");
        let guard = definition.connections[1].condition.as_ref().unwrap();
        assert_eq!(guard.operator, ConditionOperator::Eq);
        assert_eq!(definition.connections[1].priority, 2);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
id: wf-yaml
name: YAML workflow
nodes:
  - id: start
    kind: initial
  - id: approve
    kind: approval
    config:
      question: Run it?
connections:
  - fromNodeId: start
    toNodeId: approve
"#;
        let definition = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(definition.name, "YAML workflow");
        assert_eq!(definition.get_node("approve").unwrap().config["question"], "Run it?");
    }

    #[test]
    fn test_json_roundtrip_uses_camel_case() {
        let definition = WorkflowDefinition::new("wf").node("a", "initial").connect("a", END);
        let json = definition.to_json().unwrap();
        assert!(json.contains("fromNodeId"));
        assert!(!json.contains("condition"));
        assert_eq!(WorkflowDefinition::from_json(&json).unwrap(), definition);
    }
}
