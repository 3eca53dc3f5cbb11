//! Runtime configuration
//!
//! Bounds for the interpreter loop. `max_attempts` is the retry bound shared
//! by the generate/approval/condition vertices; `max_steps` is a backstop
//! against miswired graphs that never reach a terminal vertex. The runtime
//! raises the backstop per graph so it never fires before the retry bound.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default retry bound for the SQL generate loop
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum generate attempts before a run is force-terminated
    pub max_attempts: u32,

    /// Minimum vertex executions per run/resume before aborting; see
    /// [`CompiledGraph::step_budget`](crate::workflow::CompiledGraph::step_budget)
    pub max_steps: usize,

    /// Timeout for individual vertex computation
    #[serde(with = "humantime_serde")]
    pub node_timeout: Duration,

    /// Enable detailed tracing
    pub tracing_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_steps: 100,
            node_timeout: Duration::from_secs(300), // 5 min per node
            tracing_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry bound (minimum 1)
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Set maximum steps per drive
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    /// Set node timeout
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    /// Enable or disable tracing
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }
}
