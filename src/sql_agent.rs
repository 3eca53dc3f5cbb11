//! Pre-built SQL agent workflow
//!
//! Natural-language question in, approved SQL answer out.
//!
//! # Workflow Structure
//!
//! ```text
//!   ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌─────────────────┐
//!   │  schema  │ ─▶ │ generate │ ─▶ │ execute  │ ─▶ │ should_continue │
//!   └──────────┘    └──────────┘    └──────────┘    └───────┬─────────┘
//!                        ▲                          no      │ yes
//!                        └──────────────────────────────────┤
//!                        ▲                                  ▼
//!                        │       rejected            ┌──────────┐
//!                        └────────────────────────── │ approval │ ─▶ END
//!                                                    └──────────┘
//! ```
//!
//! `should_continue` routes to approval when the last execution produced no
//! error, otherwise back to generation. It halts the run once the attempt
//! limit is reached.
//!
//! # Usage
//!
//! ```ignore
//! use sqlflow::sql_agent::SqlAgentWorkflowBuilder;
//!
//! let definition = SqlAgentWorkflowBuilder::new("sql-agent")
//!     .connection_string("postgres://localhost/shop")
//!     .max_attempts(3)
//!     .build();
//! store.put(&definition).await?;
//! ```

use serde_json::json;

use crate::workflow::graph::{NodeDefinition, WorkflowDefinition};
use crate::workflow::node::NodeKind;

pub const SCHEMA_NODE: &str = "schema";
pub const GENERATE_NODE: &str = "generate";
pub const EXECUTE_NODE: &str = "execute";
pub const CHECK_NODE: &str = "should_continue";
pub const APPROVAL_NODE: &str = "approval";

/// Builder for the canonical SQL agent workflow definition.
#[derive(Debug, Clone)]
pub struct SqlAgentWorkflowBuilder {
    id: String,
    name: String,
    connection_string: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    max_attempts: Option<u32>,
    question: Option<String>,
}

impl SqlAgentWorkflowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "SQL Agent".to_string(),
            connection_string: None,
            model: None,
            temperature: None,
            max_attempts: None,
            question: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Database target for the schema and execute nodes.
    ///
    /// Without one the nodes use the compiler's default target.
    pub fn connection_string(mut self, target: impl Into<String>) -> Self {
        self.connection_string = Some(target.into());
        self
    }

    /// Model override for SQL generation
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Attempt limit enforced by the retry check and the approval node.
    ///
    /// Without one the check uses the compiler's limit
    /// (default [`crate::engine::DEFAULT_MAX_ATTEMPTS`]).
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max.max(1));
        self
    }

    /// Question shown to the reviewer at the approval node
    pub fn approval_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn build(self) -> WorkflowDefinition {
        let mut schema = NodeDefinition::new(SCHEMA_NODE, NodeKind::SchemaTrigger.as_str());
        let mut execute = NodeDefinition::new(EXECUTE_NODE, NodeKind::SqlExecute.as_str());
        if let Some(target) = &self.connection_string {
            schema = schema.with_config("connectionString", target.as_str());
            execute = execute.with_config("connectionString", target.as_str());
        }

        let mut generate = NodeDefinition::new(GENERATE_NODE, NodeKind::SqlGenerate.as_str());
        if let Some(model) = &self.model {
            generate = generate.with_config("model", model.as_str());
        }
        if let Some(temperature) = self.temperature {
            generate = generate.with_config("temperature", temperature);
        }

        let mut check = NodeDefinition::new(CHECK_NODE, NodeKind::Condition.as_str())
            .with_config("field", "error")
            .with_config("operator", "not_exists");
        let mut approval = NodeDefinition::new(APPROVAL_NODE, NodeKind::Approval.as_str())
            .with_config("retryNode", GENERATE_NODE);
        if let Some(max) = self.max_attempts {
            check = check.with_config("maxAttempts", json!(max));
            approval = approval.with_config("maxAttempts", json!(max));
        }
        if let Some(question) = &self.question {
            approval = approval.with_config("question", question.as_str());
        }

        WorkflowDefinition::new(self.id)
            .name(self.name)
            .add_node(schema)
            .add_node(generate)
            .add_node(execute)
            .add_node(check)
            .add_node(approval)
            .connect(SCHEMA_NODE, GENERATE_NODE)
            .connect(GENERATE_NODE, EXECUTE_NODE)
            .connect(EXECUTE_NODE, CHECK_NODE)
            .on_yes(CHECK_NODE, APPROVAL_NODE)
            .on_no(CHECK_NODE, GENERATE_NODE)
    }
}
