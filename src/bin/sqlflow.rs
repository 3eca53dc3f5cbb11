//! sqlflow CLI
//!
//! Runs SQL agent workflows against PostgreSQL with an interactive approval
//! prompt, and renders workflow graphs as Mermaid.
//!
//! # Required Environment Variables
//!
//! - `OPENAI_API_KEY`: OpenAI API key (for `run`)
//! - `DATABASE_URL`: default database target (for `run`, unless the workflow names one)
//!
//! # Usage
//!
//! ```bash
//! # Ask a question with the built-in sql-agent workflow
//! sqlflow run "How many orders were placed last week?"
//!
//! # Use a workflow from a directory of definitions
//! sqlflow run --workflow-dir ./workflows --workflow reporting "Revenue by region"
//!
//! # Print the Mermaid diagram of a workflow file
//! sqlflow graph --file ./workflows/reporting.yaml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use sqlflow::prompts::summarize_result;
use sqlflow::{
    ApprovalResponse, ExecutionResponse, GraphCompiler, InterruptContext, MemoryWorkflowStore,
    NodeResources, PostgresAccessor, SqlAgentWorkflowBuilder, SqlflowConfig, WorkflowDefinition,
    WorkflowStore,
};

const BUILTIN_WORKFLOW: &str = "sql-agent";
const PREVIEW_ROWS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "sqlflow")]
#[command(about = "LLM-driven SQL workflows with human approval")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question by running a workflow
    Run {
        /// Natural-language question
        question: String,

        /// Workflow id
        #[arg(short, long, default_value = BUILTIN_WORKFLOW)]
        workflow: String,

        /// Directory of workflow definitions (overrides SQLFLOW_WORKFLOW_DIR)
        #[arg(long)]
        workflow_dir: Option<PathBuf>,

        /// Database target (overrides DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,

        /// Model (overrides SQLFLOW_MODEL)
        #[arg(short, long)]
        model: Option<String>,

        /// Approve every query without prompting
        #[arg(long)]
        yes: bool,

        /// Print the final response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a workflow as a Mermaid flowchart
    Graph {
        /// Workflow id to load from the workflow directory
        #[arg(short, long, default_value = BUILTIN_WORKFLOW)]
        workflow: String,

        /// Workflow definition file (JSON or YAML)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Directory of workflow definitions (overrides SQLFLOW_WORKFLOW_DIR)
        #[arg(long)]
        workflow_dir: Option<PathBuf>,

        /// Highlight a node as suspended
        #[arg(long)]
        suspended_at: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Store for the configured directory; the built-in workflow is served from
/// memory when no directory is configured.
fn workflow_store(config: &SqlflowConfig) -> Arc<dyn WorkflowStore> {
    match &config.workflow_dir {
        Some(_) => config.workflow_store(),
        None => Arc::new(MemoryWorkflowStore::with_workflows([
            SqlAgentWorkflowBuilder::new(BUILTIN_WORKFLOW).build(),
        ])),
    }
}

// =============================================================================
// Output Formatting
// =============================================================================

fn print_context(context: &InterruptContext) {
    let separator = "━".repeat(60);
    println!();
    println!("{}", separator.cyan());
    println!(
        "{} {}",
        "Approval required".yellow().bold(),
        format!("(attempt {})", context.attempt_count).dimmed()
    );
    println!("{}", separator.cyan());
    println!("{} {}", "Question:".white().bold(), context.user_query);
    println!();
    println!("{}", "SQL:".white().bold());
    for line in context.generated_sql.lines() {
        println!("  {}", line.green());
    }
    if let Some(result) = &context.query_result {
        println!();
        println!("{}", "Result:".white().bold());
        for line in summarize_result(result, PREVIEW_ROWS).lines() {
            println!("  {}", line);
        }
    }
    println!();
}

fn print_final(content: &str, approved: bool, error: Option<&str>) {
    println!();
    match (approved, error) {
        (false, Some(error)) => println!("{} {}", "✗".red().bold(), error.red()),
        _ => println!("{}", content),
    }
}

async fn ask(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> anyhow::Result<String> {
    use std::io::Write;
    print!("{}", prompt.bold());
    std::io::stdout().flush()?;
    Ok(lines
        .next_line()
        .await?
        .map(|line| line.trim().to_string())
        .unwrap_or_default())
}

// =============================================================================
// Commands
// =============================================================================

#[allow(clippy::too_many_arguments)]
async fn run(
    mut config: SqlflowConfig,
    question: String,
    workflow: String,
    workflow_dir: Option<PathBuf>,
    database_url: Option<String>,
    model: Option<String>,
    yes: bool,
    json: bool,
) -> anyhow::Result<()> {
    if let Some(dir) = workflow_dir {
        config = config.with_workflow_dir(dir);
    }
    if let Some(url) = database_url {
        config = config.with_database_url(url);
    }
    if let Some(model) = model {
        config = config.with_model(model);
    }

    let llm = config.llm_provider()?;
    let executor = config
        .build_executor_with_store(
            workflow_store(&config),
            llm,
            Arc::new(PostgresAccessor::default()),
        )
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let response = executor.execute_workflow(&workflow, &question).await?;
    let (thread_id, mut context) = match response {
        ExecutionResponse::Completed {
            ref content,
            approved,
            ref error,
            ..
        } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_final(content, approved, error.as_deref());
            }
            return Ok(());
        }
        ExecutionResponse::Interrupted {
            thread_id, context, ..
        } => (thread_id, context),
    };

    loop {
        print_context(&context);

        let (approved, feedback) = if yes {
            (true, None)
        } else {
            let answer = ask(&mut lines, "Approve? [y/N] ").await?;
            if matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
                (true, None)
            } else {
                let feedback = ask(&mut lines, "Feedback for the next attempt: ").await?;
                (false, Some(feedback).filter(|f| !f.is_empty()))
            }
        };

        let response = executor
            .submit_approval(&thread_id, approved, feedback)
            .await?;
        match response {
            ApprovalResponse::Interrupted { context: next, .. } => context = next,
            ApprovalResponse::Completed {
                ref content,
                approved,
                ref error,
                ..
            } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                } else {
                    print_final(content, approved, error.as_deref());
                }
                return Ok(());
            }
        }
    }
}

async fn graph(
    mut config: SqlflowConfig,
    workflow: String,
    file: Option<PathBuf>,
    workflow_dir: Option<PathBuf>,
    suspended_at: Option<String>,
) -> anyhow::Result<()> {
    if let Some(dir) = workflow_dir {
        config = config.with_workflow_dir(dir);
    }

    let definition = match file {
        Some(path) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
            let mut definition = if is_json {
                WorkflowDefinition::from_json(&text)?
            } else {
                WorkflowDefinition::from_yaml(&text)?
            };
            if definition.id.is_empty() {
                definition.id = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("workflow")
                    .to_string();
            }
            definition
        }
        None => match workflow_store(&config).get(&workflow).await? {
            Some(definition) => definition,
            None => bail!("workflow not found: {}", workflow),
        },
    };

    // Rendering needs no collaborators; vertices are never run.
    let compiled = GraphCompiler::new(NodeResources::new()).compile(&definition)?;
    let mermaid = match suspended_at {
        Some(node) => compiled.to_mermaid_suspended_at(&node.into()),
        None => compiled.to_mermaid(),
    };
    println!("{}", mermaid);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = SqlflowConfig::from_env()?;

    match cli.command {
        Command::Run {
            question,
            workflow,
            workflow_dir,
            database_url,
            model,
            yes,
            json,
        } => {
            run(
                config,
                question,
                workflow,
                workflow_dir,
                database_url,
                model,
                yes,
                json,
            )
            .await
        }
        Command::Graph {
            workflow,
            file,
            workflow_dir,
            suspended_at,
        } => graph(config, workflow, file, workflow_dir, suspended_at).await,
    }
}
