//! Environment-based configuration
//!
//! # Environment Variables
//!
//! | Variable | Purpose | Default |
//! |----------|---------|---------|
//! | `DATABASE_URL` | Default database target for schema/execute nodes | none |
//! | `OPENAI_API_KEY` | OpenAI API authentication | required for [`SqlflowConfig::llm_provider`] |
//! | `SQLFLOW_MODEL` | Model for generation and summarization | `gpt-4.1` |
//! | `SQLFLOW_TEMPERATURE` | Sampling temperature | `0.0` |
//! | `SQLFLOW_MAX_ATTEMPTS` | Generate/approve retry bound | `10` |
//! | `SQLFLOW_MAX_STEPS` | Vertex executions per run before aborting | `100` |
//! | `SQLFLOW_NODE_TIMEOUT_SECS` | Per-node timeout | `300` |
//! | `SQLFLOW_CHECKPOINT_DIR` | File checkpoints; in-memory when unset | none |
//! | `SQLFLOW_CHECKPOINT_COMPRESSION` | zstd-compress checkpoint files | `false` |
//! | `SQLFLOW_WORKFLOW_DIR` | Directory of workflow JSON/YAML files | none |
//!
//! # Example
//!
//! ```ignore
//! use sqlflow::config::SqlflowConfig;
//!
//! let config = SqlflowConfig::from_env()?;
//! let executor = config
//!     .build_executor(config.llm_provider()?, Arc::new(PostgresAccessor::default()))
//!     .await?;
//! ```

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::database::DatabaseAccessor;
use crate::engine::{create_checkpointer, CheckpointerConfig, EngineConfig, GraphRuntime};
use crate::error::FlowError;
use crate::executor::WorkflowExecutor;
use crate::llm::{LLMConfig, LLMProvider, OpenAIProvider, DEFAULT_MODEL};
use crate::store::{FileWorkflowStore, MemoryWorkflowStore, WorkflowStore};
use crate::workflow::{GraphCompiler, NodeResources};

/// Process configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct SqlflowConfig {
    /// Default database target
    pub database_url: Option<String>,

    pub model: String,
    pub temperature: f64,

    /// Engine bounds
    pub engine: EngineConfig,

    /// Directory for file checkpoints; `None` keeps checkpoints in memory
    pub checkpoint_dir: Option<PathBuf>,
    pub checkpoint_compression: bool,

    /// Directory of workflow definitions; `None` uses an in-memory store
    pub workflow_dir: Option<PathBuf>,
}

impl Default for SqlflowConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            engine: EngineConfig::default(),
            checkpoint_dir: None,
            checkpoint_compression: false,
            workflow_dir: None,
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, FlowError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| FlowError::Config(format!("{}={:?}: {}", key, raw, e)))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, FlowError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(FlowError::Config(format!("{}={:?}: expected a boolean", key, raw))),
    }
}

impl SqlflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment, after merging in a
    /// `.env` file if one is found. Variables already set take precedence.
    pub fn from_env() -> Result<Self, FlowError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset or empty variables keep their defaults; malformed numbers are
    /// configuration errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FlowError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.database_url = var("DATABASE_URL");
        if let Some(model) = var("SQLFLOW_MODEL") {
            config.model = model;
        }
        if let Some(raw) = var("SQLFLOW_TEMPERATURE") {
            config.temperature = parse("SQLFLOW_TEMPERATURE", &raw)?;
        }
        if let Some(raw) = var("SQLFLOW_MAX_ATTEMPTS") {
            config.engine = config
                .engine
                .with_max_attempts(parse("SQLFLOW_MAX_ATTEMPTS", &raw)?);
        }
        if let Some(raw) = var("SQLFLOW_MAX_STEPS") {
            config.engine = config.engine.with_max_steps(parse("SQLFLOW_MAX_STEPS", &raw)?);
        }
        if let Some(raw) = var("SQLFLOW_NODE_TIMEOUT_SECS") {
            let secs: u64 = parse("SQLFLOW_NODE_TIMEOUT_SECS", &raw)?;
            config.engine = config.engine.with_node_timeout(Duration::from_secs(secs));
        }
        config.checkpoint_dir = var("SQLFLOW_CHECKPOINT_DIR").map(PathBuf::from);
        if let Some(raw) = var("SQLFLOW_CHECKPOINT_COMPRESSION") {
            config.checkpoint_compression = parse_flag("SQLFLOW_CHECKPOINT_COMPRESSION", &raw)?;
        }
        config.workflow_dir = var("SQLFLOW_WORKFLOW_DIR").map(PathBuf::from);

        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    pub fn with_workflow_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workflow_dir = Some(dir.into());
        self
    }

    /// Per-user default location for file checkpoints
    pub fn default_checkpoint_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("sqlflow").join("checkpoints"))
    }

    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig::new(&self.model).with_temperature(self.temperature)
    }

    pub fn checkpointer_config(&self) -> CheckpointerConfig {
        match &self.checkpoint_dir {
            Some(path) => CheckpointerConfig::File {
                path: path.clone(),
                compression: self.checkpoint_compression,
            },
            None => CheckpointerConfig::Memory,
        }
    }

    /// OpenAI provider using `OPENAI_API_KEY`
    pub fn llm_provider(&self) -> Result<Arc<dyn LLMProvider>, FlowError> {
        if std::env::var("OPENAI_API_KEY").map_or(true, |key| key.trim().is_empty()) {
            return Err(FlowError::Config("OPENAI_API_KEY is not set".to_string()));
        }
        Ok(Arc::new(OpenAIProvider::from_env_with_config(self.llm_config())))
    }

    /// Vertex collaborators for the graph compiler
    pub fn node_resources(
        &self,
        llm: Arc<dyn LLMProvider>,
        database: Arc<dyn DatabaseAccessor>,
    ) -> NodeResources {
        let mut resources = NodeResources::new()
            .with_llm(llm)
            .with_llm_config(self.llm_config())
            .with_database(database)
            .with_max_attempts(self.engine.max_attempts);
        if let Some(url) = &self.database_url {
            resources = resources.with_default_target(url.clone());
        }
        resources
    }

    /// File store when a workflow directory is configured, otherwise an empty
    /// in-memory store
    pub fn workflow_store(&self) -> Arc<dyn WorkflowStore> {
        match &self.workflow_dir {
            Some(dir) => Arc::new(FileWorkflowStore::new(dir.clone())),
            None => Arc::new(MemoryWorkflowStore::new()),
        }
    }

    /// Assemble an executor with the configured store, checkpointer and bounds
    pub async fn build_executor(
        &self,
        llm: Arc<dyn LLMProvider>,
        database: Arc<dyn DatabaseAccessor>,
    ) -> Result<WorkflowExecutor, FlowError> {
        self.build_executor_with_store(self.workflow_store(), llm, database)
            .await
    }

    pub async fn build_executor_with_store(
        &self,
        store: Arc<dyn WorkflowStore>,
        llm: Arc<dyn LLMProvider>,
        database: Arc<dyn DatabaseAccessor>,
    ) -> Result<WorkflowExecutor, FlowError> {
        let checkpointer = create_checkpointer(self.checkpointer_config()).await?;
        let compiler = GraphCompiler::new(self.node_resources(llm, database));
        let runtime = GraphRuntime::new(self.engine.clone(), checkpointer);
        Ok(WorkflowExecutor::new(store, compiler, runtime))
    }
}
