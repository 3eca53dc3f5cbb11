//! Execution engine for compiled workflow graphs
//!
//! Key concepts:
//!
//! - **Vertex**: Computation unit (schema, generate, execute, approval, ...)
//! - **Route**: How execution leaves a vertex (direct, yes/no, guarded)
//! - **Step**: One vertex execution plus state merge
//! - **Checkpoint**: Persisted state of a run suspended at an approval node
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GraphRuntime                           │
//! │  ┌──────┐   ┌──────┐   ┌──────┐                             │
//! │  │ Step │ → │ Step │ → │ Step │ → ... → Completed           │
//! │  │  1   │   │  2   │   │  3   │                             │
//! │  └──────┘   └──────┘   └──┬───┘                             │
//! │                           │ Suspend                         │
//! │                           ▼                                 │
//! │                   ┌──────────────┐   resume(decision)       │
//! │                   │ Checkpointer │ ───────────────────▶ ... │
//! │                   └──────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod runtime;
pub mod vertex;
pub mod visualization;

// Re-exports
pub use checkpoint::{
    create_checkpointer, Checkpoint, Checkpointer, CheckpointerConfig, FileCheckpointer,
    MemoryCheckpointer,
};
#[cfg(feature = "checkpointer-sqlite")]
pub use checkpoint::SqliteCheckpointer;
pub use config::{EngineConfig, DEFAULT_MAX_ATTEMPTS};
pub use error::EngineError;
pub use runtime::{GraphRuntime, RunOutcome, SuspendDescriptor};
pub use vertex::{
    BoxedVertex, ComputeResult, InterruptContext, NodeContext, SuspendSignal, Vertex, VertexId,
};
pub use visualization::{render_edge, render_node, render_node_with_class, sanitize_id};
