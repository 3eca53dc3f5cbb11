//! Prompt templates for the SQL agent vertices.

use serde_json::Value;

use crate::state::{ExecutionState, Message, QueryResult};

const SQL_SYSTEM_PROMPT: &str = "You are an expert PostgreSQL assistant. \
Given a database schema and a question, write a single SQL statement that answers it.\n\
Rules:\n\
- Use only tables, columns and enum values that appear in the schema.\n\
- Quote identifiers that contain capital letters, e.g. \"User\".\n\
- Prefer SELECT statements; never drop or truncate tables.\n\
- Respond with the SQL only, without explanation.";

const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful data analyst. \
Answer the user's question in plain language using only the query result provided. \
Be concise and mention concrete numbers where relevant.";

/// Prompt builder for SQL generation and result summarization
#[derive(Debug, Clone)]
pub struct SqlPrompts {
    pub sql_system: String,
    pub answer_system: String,
}

impl Default for SqlPrompts {
    fn default() -> Self {
        Self {
            sql_system: SQL_SYSTEM_PROMPT.to_string(),
            answer_system: ANSWER_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl SqlPrompts {
    /// Messages for the SQL generation call.
    ///
    /// The previous error and reviewer feedback are included when present so
    /// the model can correct its last attempt.
    pub fn generation(&self, state: &ExecutionState) -> Vec<Message> {
        let mut prompt = String::new();

        prompt.push_str("Database schema:\n");
        if state.db_schema.trim().is_empty() {
            prompt.push_str("(schema unavailable)\n");
        } else {
            prompt.push_str(&state.db_schema);
            prompt.push('\n');
        }

        prompt.push_str("\nQuestion: ");
        prompt.push_str(&state.user_query);
        prompt.push('\n');

        if !state.generated_sql.is_empty() {
            if let Some(error) = state.error.as_deref().filter(|e| !e.is_empty()) {
                prompt.push_str(&format!(
                    "\nThe previous query failed.\nPrevious query:\n{}\nError: {}\n",
                    state.generated_sql, error
                ));
            }
        }

        if let Some(feedback) = state.feedback.as_deref().filter(|f| !f.is_empty()) {
            if !state.generated_sql.is_empty() {
                prompt.push_str(&format!(
                    "\nA reviewer rejected the previous query:\n{}\n",
                    state.generated_sql
                ));
            }
            prompt.push_str(&format!("Reviewer feedback: {}\n", feedback));
        }

        prompt.push_str("\nSQL:");

        vec![Message::system(&self.sql_system), Message::user(&prompt)]
    }

    /// Messages for turning a query result into a natural-language answer.
    pub fn answer(&self, state: &ExecutionState, result: &QueryResult, sample_rows: usize) -> Vec<Message> {
        let prompt = format!(
            "Question: {}\n\nSQL:\n{}\n\nResult:\n{}",
            state.user_query,
            state.generated_sql,
            summarize_result(result, sample_rows)
        );
        vec![Message::system(&self.answer_system), Message::user(&prompt)]
    }
}

/// Compact text view of a result: row count plus the first `sample_rows` rows.
pub fn summarize_result(result: &QueryResult, sample_rows: usize) -> String {
    if result.rows.is_empty() {
        return format!("{} rows (no result set)", result.row_count);
    }

    let mut summary = format!("{} rows", result.row_count);
    let shown = result.rows.len().min(sample_rows);
    if shown < result.rows.len() {
        summary.push_str(&format!(", first {} shown", shown));
    }
    summary.push_str(":\n");

    for row in result.rows.iter().take(shown) {
        summary.push_str(&render_row(row));
        summary.push('\n');
    }
    summary
}

fn render_row(row: &Value) -> String {
    serde_json::to_string(row).unwrap_or_else(|_| row.to_string())
}
