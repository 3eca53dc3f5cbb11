//! End-to-end runs of the canonical SQL agent workflow
//!
//! Covers the approval round trips, the bounded retry loop and the
//! request-level responses returned by the executor.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{resources, sql_agent_executor, users_database, ScriptedLlm, USERS_SQL};
use sqlflow::{
    ApprovalDecision, ApprovalResponse, EngineConfig, ExecutionResponse, ExecutionState, FlowError,
    GraphCompiler, GraphRuntime, MemoryCheckpointer, MemoryDatabase, RunOutcome,
    SqlAgentWorkflowBuilder, WorkflowDefinition,
};

const LIMITED_SQL: &str = r#"SELECT * FROM "User" LIMIT 10;"#;

// =============================================================================
// Approval round trips
// =============================================================================

#[tokio::test]
async fn test_suspends_for_approval_with_rows() {
    let llm = ScriptedLlm::new(&[USERS_SQL, "There are 3 users."]);
    let database = users_database();
    let executor = sql_agent_executor(&llm, &database);

    let response = executor
        .execute_workflow("sql-agent", "show all users")
        .await
        .unwrap();

    let ExecutionResponse::Interrupted { thread_id, context, .. } = response else {
        panic!("expected an approval interrupt, got {:?}", response);
    };
    assert!(!thread_id.is_empty());
    assert_eq!(context.user_query, "show all users");
    assert_eq!(context.generated_sql, USERS_SQL);
    assert_eq!(context.attempt_count, 1);
    let result = context.query_result.unwrap();
    assert_eq!(result.row_count, 3);
    assert_eq!(result.rows[0], json!({"id": 1, "email": "a@example.com"}));

    // Schema reached the generation prompt
    assert!(llm.prompts()[0].contains("Table \"User\""));
    assert_eq!(database.releases().await, database.connections().await.len());
}

#[tokio::test]
async fn test_rejection_regenerates_with_feedback() {
    let llm = ScriptedLlm::new(&[USERS_SQL, "There are 3 users.", LIMITED_SQL, "Here are 3 users."]);
    let database = users_database().with_rows(
        LIMITED_SQL,
        vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})],
    );
    let executor = sql_agent_executor(&llm, &database);

    let first = executor
        .execute_workflow("sql-agent", "show all users")
        .await
        .unwrap();
    let thread_id = first.thread_id().to_string();

    let second = executor
        .submit_approval(&thread_id, false, Some("use LIMIT 10".to_string()))
        .await
        .unwrap();
    let ApprovalResponse::Interrupted { context, .. } = second else {
        panic!("expected a second approval interrupt, got {:?}", second);
    };
    assert_eq!(context.generated_sql, LIMITED_SQL);
    assert_eq!(context.attempt_count, 2);

    let regeneration_prompt = &llm.prompts()[2];
    assert!(regeneration_prompt.contains("Reviewer feedback: use LIMIT 10"));
    assert!(regeneration_prompt.contains(USERS_SQL));

    let last = executor.submit_approval(&thread_id, true, None).await.unwrap();
    assert_eq!(
        last,
        ApprovalResponse::Completed {
            completed: true,
            content: "Here are 3 users.".to_string(),
            approved: true,
            error: None,
        }
    );
    assert!(executor.pending_threads().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resuming_twice_fails() {
    let llm = ScriptedLlm::new(&[USERS_SQL, "There are 3 users."]);
    let executor = sql_agent_executor(&llm, &users_database());

    let response = executor.execute_workflow("sql-agent", "show all users").await.unwrap();
    let thread_id = response.thread_id().to_string();

    executor.submit_approval(&thread_id, true, None).await.unwrap();
    let err = executor.submit_approval(&thread_id, true, None).await.unwrap_err();
    assert!(matches!(err, FlowError::Engine(_)));
}

#[tokio::test]
async fn test_concurrent_threads_are_isolated() {
    // Replies interleave across threads, so every reply is valid SQL.
    let llm = ScriptedLlm::new(&[USERS_SQL]);
    let executor = Arc::new(sql_agent_executor(&llm, &users_database()));

    let a = executor.execute_workflow("sql-agent", "show all users");
    let b = executor.execute_workflow("sql-agent", "show all users");
    let (a, b) = tokio::join!(a, b);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.thread_id(), b.thread_id());
    assert_eq!(executor.pending_threads().await.unwrap().len(), 2);

    executor.abandon(a.thread_id()).await.unwrap();
    let pending = executor.pending_threads().await.unwrap();
    assert_eq!(pending, vec![b.thread_id().to_string()]);

    let done = executor.submit_approval(b.thread_id(), true, None).await.unwrap();
    assert!(!done.is_interrupted());
}

// =============================================================================
// Bounded retries
// =============================================================================

#[tokio::test]
async fn test_failing_execution_stops_at_attempt_limit() {
    let llm = ScriptedLlm::new(&["SELECT * FROM missing_table"]);
    let database = MemoryDatabase::new()
        .with_schema(vec![], vec![])
        .with_fallback_failure("relation \"missing_table\" does not exist");
    let executor = sql_agent_executor(&llm, &database);

    let response = executor
        .execute_workflow("sql-agent", "show all users")
        .await
        .unwrap();

    let ExecutionResponse::Completed { content, approved, error, .. } = response else {
        panic!("expected completion, got {:?}", response);
    };
    assert!(!approved);
    assert_eq!(error.as_deref(), Some("Maximum retry attempts (10) exceeded"));
    assert_eq!(content, "Maximum retry attempts (10) exceeded");
    assert_eq!(llm.prompts().len(), 10);

    // The error from the previous attempt is shown to the model
    assert!(llm.prompts()[1].contains("missing_table\" does not exist"));
}

#[tokio::test]
async fn test_attempt_count_is_monotonic_and_bounded() {
    let llm = ScriptedLlm::new(&["SELECT 1"]);
    let database = MemoryDatabase::new()
        .with_schema(vec![], vec![])
        .with_fallback_failure("boom");
    let definition = SqlAgentWorkflowBuilder::new("sql-agent").max_attempts(3).build();
    let graph = GraphCompiler::new(resources(&llm, &database))
        .compile(&definition)
        .unwrap();
    let runtime = GraphRuntime::new(EngineConfig::default(), Arc::new(MemoryCheckpointer::new()));

    let outcome = runtime
        .run(&graph, "t-bounded", ExecutionState::new("anything"))
        .await
        .unwrap();

    let RunOutcome::Completed(state) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(state.attempt_count, 3);
    assert_eq!(state.condition_result, Some(false));
    assert!(!state.approved);
    assert_eq!(state.error.as_deref(), Some("Maximum retry attempts (3) exceeded"));
    assert_eq!(llm.prompts().len(), 3);

    // Every attempt re-executed a statement after the schema queries
    let executed = database.executed().await;
    assert_eq!(executed.iter().filter(|sql| *sql == "SELECT 1").count(), 3);
}

#[tokio::test]
async fn test_large_attempt_bound_ends_normally() {
    let llm = ScriptedLlm::new(&["SELECT 1"]);
    let database = MemoryDatabase::new()
        .with_schema(vec![], vec![])
        .with_fallback_failure("boom");
    let definition = SqlAgentWorkflowBuilder::new("sql-agent").max_attempts(40).build();
    let graph = GraphCompiler::new(resources(&llm, &database))
        .compile(&definition)
        .unwrap();
    assert_eq!(graph.attempt_bound(), 40);

    // The default step backstop is far below 40 retries of the loop
    let config = EngineConfig::default().with_max_attempts(40);
    assert!(config.max_steps < 40 * 3);
    let runtime = GraphRuntime::new(config, Arc::new(MemoryCheckpointer::new()));

    let outcome = runtime
        .run(&graph, "t-forty", ExecutionState::new("anything"))
        .await
        .unwrap();

    let state = outcome.state().unwrap();
    assert_eq!(state.attempt_count, 40);
    assert!(!state.approved);
    assert_eq!(state.error.as_deref(), Some("Maximum retry attempts (40) exceeded"));
    assert_eq!(llm.prompts().len(), 40);
}

#[tokio::test]
async fn test_compiler_attempt_bound_scales_step_limit() {
    let llm = ScriptedLlm::new(&["SELECT 1"]);
    let database = MemoryDatabase::new()
        .with_schema(vec![], vec![])
        .with_fallback_failure("boom");
    let definition = SqlAgentWorkflowBuilder::new("sql-agent").build();
    let graph = GraphCompiler::new(resources(&llm, &database).with_max_attempts(50))
        .compile(&definition)
        .unwrap();
    let runtime = GraphRuntime::new(EngineConfig::default(), Arc::new(MemoryCheckpointer::new()));

    let outcome = runtime
        .run(&graph, "t-fifty", ExecutionState::new("anything"))
        .await
        .unwrap();

    let state = outcome.state().unwrap();
    assert_eq!(state.attempt_count, 50);
    assert_eq!(state.error.as_deref(), Some("Maximum retry attempts (50) exceeded"));
}

#[tokio::test]
async fn test_approval_node_enforces_its_own_attempt_bound() {
    let llm = ScriptedLlm::new(&[USERS_SQL]);
    let database = users_database();
    // No condition node: the approval node is the only retry guard
    let definition = WorkflowDefinition::new("review-only")
        .node("schema", "schema-trigger")
        .node("generate", "sql-generate")
        .node("execute", "sql-execute")
        .add_node(
            sqlflow::NodeDefinition::new("approval", "approval").with_config("maxAttempts", json!(2)),
        )
        .connect("schema", "generate")
        .connect("generate", "execute")
        .connect("execute", "approval");
    let graph = GraphCompiler::new(resources(&llm, &database))
        .compile(&definition)
        .unwrap();
    let runtime = GraphRuntime::new(EngineConfig::default(), Arc::new(MemoryCheckpointer::new()));

    let outcome = runtime
        .run(&graph, "t-review", ExecutionState::new("show all users"))
        .await
        .unwrap();
    assert!(outcome.is_suspended());

    let outcome = runtime
        .resume(&graph, "t-review", &ApprovalDecision::reject("try again"))
        .await
        .unwrap();
    let RunOutcome::Suspended(descriptor) = outcome else {
        panic!("expected a second approval request");
    };
    assert_eq!(descriptor.context.attempt_count, 2);

    let outcome = runtime
        .resume(&graph, "t-review", &ApprovalDecision::reject("still wrong"))
        .await
        .unwrap();
    let state = outcome.state().unwrap();
    assert!(!state.approved);
    assert_eq!(state.attempt_count, 2);
    assert_eq!(state.error.as_deref(), Some("Maximum retry attempts (2) exceeded"));
    // One generation and one answer summary per attempt
    assert_eq!(llm.prompts().len(), 4);
}

#[tokio::test]
async fn test_model_failure_is_recorded_not_fatal() {
    let llm = ScriptedLlm::new(&[""]);
    let database = MemoryDatabase::new().with_schema(vec![], vec![]);
    let definition = SqlAgentWorkflowBuilder::new("sql-agent").max_attempts(2).build();
    let graph = GraphCompiler::new(resources(&llm, &database))
        .compile(&definition)
        .unwrap();
    let runtime = GraphRuntime::new(EngineConfig::default(), Arc::new(MemoryCheckpointer::new()));

    let outcome = runtime
        .run(&graph, "t-empty", ExecutionState::new("anything"))
        .await
        .unwrap();

    let state = outcome.state().unwrap();
    assert_eq!(state.attempt_count, 2);
    assert_eq!(state.error.as_deref(), Some("Maximum retry attempts (2) exceeded"));
    // Nothing was generated, so nothing was executed beyond the schema queries
    assert_eq!(database.executed().await.len(), 2);
}

// =============================================================================
// Programming errors and lookups
// =============================================================================

#[tokio::test]
async fn test_missing_language_model_aborts_run() {
    let database = users_database();
    let definition = SqlAgentWorkflowBuilder::new("sql-agent").build();
    let compiler = GraphCompiler::new(
        sqlflow::NodeResources::new()
            .with_database(Arc::new(database))
            .with_default_target("memory://shop"),
    );
    let graph = compiler.compile(&definition).unwrap();
    let checkpointer = Arc::new(MemoryCheckpointer::new());
    let runtime = GraphRuntime::new(EngineConfig::default(), checkpointer);

    let err = runtime
        .run(&graph, "t-no-llm", ExecutionState::new("show all users"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("generate"));
}

#[tokio::test]
async fn test_unknown_workflow() {
    let llm = ScriptedLlm::new(&[USERS_SQL]);
    let executor = sql_agent_executor(&llm, &users_database());
    let err = executor.execute_workflow("nope", "q").await.unwrap_err();
    assert!(matches!(err, FlowError::WorkflowNotFound(ref id) if id == "nope"));
}
