//! Workflow definitions and their compilation into executable graphs
//!
//! # Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    WorkflowDefinition                        │
//! │   nodes (id, kind, config)  +  connections (from → to)       │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ GraphCompiler::compile
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CompiledGraph                           │
//! │  ┌────────┐   ┌──────────┐   ┌─────────┐   ┌───────────┐     │
//! │  │ schema │ → │ generate │ → │ execute │ → │ condition │     │
//! │  └────────┘   └──────────┘   └─────────┘   └─────┬─────┘     │
//! │                     ▲              no            │ yes       │
//! │                     └────────────────────────────┤           │
//! │                                            ┌─────▼────┐      │
//! │                                            │ approval │      │
//! │                                            └──────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Compiled graphs are cached per workflow id in a [`GraphCache`] and
//! executed by `engine::GraphRuntime`.

pub mod cache;
pub mod compiled;
pub mod condition;
pub mod graph;
pub mod node;
pub mod router;
pub mod vertices;

pub use cache::GraphCache;
pub use compiled::{CompileError, CompiledGraph, GraphCompiler};
pub use condition::{evaluate, resolve_field, Condition, ConditionOperator};
pub use graph::{Connection, NodeDefinition, WorkflowDefinition, END, START};
pub use node::{
    ApprovalNodeConfig, ConditionNodeConfig, NodeConfig, NodeKind, NodeRegistry,
    SchemaNodeConfig, SqlExecuteNodeConfig, SqlGenerateNodeConfig,
};
pub use router::{ConditionalEdge, Route};
pub use vertices::NodeResources;
