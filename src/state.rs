//! Execution state threaded through every workflow node
//!
//! `ExecutionState` is the full data bag a run carries. Nodes never return a
//! whole state: they return a [`StateUpdate`] holding only the fields they
//! change, and [`merge_state`] folds it in using each field's own rule:
//!
//! | Field             | Merge rule                          |
//! |-------------------|-------------------------------------|
//! | `conversation`    | append                              |
//! | `attemptCount`    | monotonic (never decreases)         |
//! | everything else   | last write wins                     |
//!
//! Nullable fields (`error`, `feedback`, `conditionResult`) can be set or
//! explicitly cleared by an update.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}

/// Rows returned by a SQL statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Rows returned, or rows affected for statements without a result set
    pub row_count: usize,
    /// One JSON object per row
    #[serde(default)]
    pub rows: Vec<Value>,
}

impl QueryResult {
    /// Result set with `row_count` derived from the rows
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            row_count: rows.len(),
            rows,
        }
    }

    /// Result of a statement that only reports affected rows
    pub fn affected(row_count: usize) -> Self {
        Self {
            row_count,
            rows: Vec::new(),
        }
    }
}

/// The mutable data bag passed to and returned from every node.
///
/// Serialized field names are camelCase (`userQuery`, `generatedSql`, ...);
/// condition paths such as `queryResult.rowCount` resolve against them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionState {
    pub conversation: Vec<Message>,
    pub user_query: String,
    pub db_schema: String,
    pub generated_sql: String,
    pub query_result: Option<QueryResult>,
    pub error: Option<String>,
    pub attempt_count: u32,
    pub approved: bool,
    pub feedback: Option<String>,
    pub condition_result: Option<bool>,
}

impl ExecutionState {
    /// Initial state for a user question; the question opens the conversation.
    pub fn new(user_query: &str) -> Self {
        Self {
            conversation: vec![Message::user(user_query)],
            user_query: user_query.to_string(),
            ..Default::default()
        }
    }

    /// Apply a partial update, returning the merged state.
    ///
    /// The original state is left untouched.
    pub fn apply_update(&self, update: StateUpdate) -> Self {
        let mut next = self.clone();

        next.conversation.extend(update.conversation);
        if let Some(user_query) = update.user_query {
            next.user_query = user_query;
        }
        if let Some(db_schema) = update.db_schema {
            next.db_schema = db_schema;
        }
        if let Some(generated_sql) = update.generated_sql {
            next.generated_sql = generated_sql;
        }
        if let Some(query_result) = update.query_result {
            next.query_result = Some(query_result);
        }
        if let Some(error) = update.error {
            next.error = error;
        }
        if let Some(attempt_count) = update.attempt_count {
            next.attempt_count = next.attempt_count.max(attempt_count);
        }
        if let Some(approved) = update.approved {
            next.approved = approved;
        }
        if let Some(feedback) = update.feedback {
            next.feedback = feedback;
        }
        if let Some(condition_result) = update.condition_result {
            next.condition_result = condition_result;
        }

        next
    }

    /// Most recent assistant message, if any
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.conversation
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Text to surface to the caller once a run completes.
    ///
    /// A rejected run with an error reports the error; otherwise the last
    /// assistant answer is returned.
    pub fn final_content(&self) -> String {
        if !self.approved {
            if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
                return error.to_string();
            }
        }
        self.last_assistant_message()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// JSON view of the state, used for condition field lookups
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A partial state returned by a node.
///
/// `None` means "leave the field alone". For nullable fields the inner
/// option distinguishes "set" (`Some(Some(v))`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub conversation: Vec<Message>,
    pub user_query: Option<String>,
    pub db_schema: Option<String>,
    pub generated_sql: Option<String>,
    pub query_result: Option<QueryResult>,
    pub error: Option<Option<String>>,
    pub attempt_count: Option<u32>,
    pub approved: Option<bool>,
    pub feedback: Option<Option<String>>,
    pub condition_result: Option<Option<bool>>,
}

impl StateUpdate {
    /// An update that changes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.conversation.push(message);
        self
    }

    pub fn with_user_query(mut self, user_query: impl Into<String>) -> Self {
        self.user_query = Some(user_query.into());
        self
    }

    pub fn with_db_schema(mut self, db_schema: impl Into<String>) -> Self {
        self.db_schema = Some(db_schema.into());
        self
    }

    pub fn with_generated_sql(mut self, sql: impl Into<String>) -> Self {
        self.generated_sql = Some(sql.into());
        self
    }

    pub fn with_query_result(mut self, result: QueryResult) -> Self {
        self.query_result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn with_attempt_count(mut self, attempt_count: u32) -> Self {
        self.attempt_count = Some(attempt_count);
        self
    }

    pub fn with_approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn with_feedback(mut self, feedback: Option<String>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_condition_result(mut self, result: bool) -> Self {
        self.condition_result = Some(Some(result));
        self
    }

    pub fn clear_condition_result(mut self) -> Self {
        self.condition_result = Some(None);
        self
    }

    /// Build an update from a loosely typed JSON document.
    ///
    /// Known camelCase keys are read; unknown keys and values of the wrong
    /// type are skipped. `null` clears nullable fields.
    pub fn from_json(value: &Value) -> Self {
        let mut update = Self::empty();
        let Some(fields) = value.as_object() else {
            return update;
        };

        for (key, value) in fields {
            match key.as_str() {
                "conversation" => match serde_json::from_value::<Vec<Message>>(value.clone()) {
                    Ok(messages) => update.conversation = messages,
                    Err(e) => debug!(error = %e, "Ignoring malformed conversation"),
                },
                "userQuery" => update.user_query = value.as_str().map(String::from),
                "dbSchema" => update.db_schema = value.as_str().map(String::from),
                "generatedSql" => update.generated_sql = value.as_str().map(String::from),
                "queryResult" => {
                    update.query_result = serde_json::from_value(value.clone()).ok();
                }
                "error" => update.error = nullable(value, |v| v.as_str().map(String::from)),
                "attemptCount" => {
                    update.attempt_count = value.as_u64().and_then(|n| u32::try_from(n).ok());
                }
                "approved" => update.approved = value.as_bool(),
                "feedback" => update.feedback = nullable(value, |v| v.as_str().map(String::from)),
                "conditionResult" => update.condition_result = nullable(value, Value::as_bool),
                other => debug!(field = other, "Ignoring unknown state field"),
            }
        }

        update
    }
}

fn nullable<T>(value: &Value, read: impl Fn(&Value) -> Option<T>) -> Option<Option<T>> {
    if value.is_null() {
        Some(None)
    } else {
        read(value).map(Some)
    }
}

/// A human decision submitted for a suspended approval node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            feedback: None,
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            approved: false,
            feedback: Some(feedback.into()),
        }
    }
}

impl From<&ApprovalDecision> for StateUpdate {
    fn from(decision: &ApprovalDecision) -> Self {
        StateUpdate::empty()
            .with_approved(decision.approved)
            .with_feedback(decision.feedback.clone())
    }
}

/// Merge a partial update into a state.
///
/// Total and deterministic; `merge_state(s, StateUpdate::empty()) == s`.
pub fn merge_state(previous: &ExecutionState, partial: StateUpdate) -> ExecutionState {
    previous.apply_update(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn populated_state() -> ExecutionState {
        ExecutionState {
            conversation: vec![Message::user("show all users"), Message::assistant("3 users")],
            user_query: "show all users".into(),
            db_schema: "Table \"User\"".into(),
            generated_sql: "SELECT * FROM \"User\";".into(),
            query_result: Some(QueryResult::new(vec![json!({"id": 1})])),
            error: Some("boom".into()),
            attempt_count: 2,
            approved: false,
            feedback: Some("use LIMIT 10".into()),
            condition_result: Some(true),
        }
    }

    #[test]
    fn test_merge_empty_is_identity() {
        let state = populated_state();
        assert_eq!(merge_state(&state, StateUpdate::empty()), state);
        assert_eq!(
            merge_state(&ExecutionState::default(), StateUpdate::empty()),
            ExecutionState::default()
        );
    }

    #[test]
    fn test_conversation_appends() {
        let state = ExecutionState::new("hi");
        let merged = state.apply_update(StateUpdate::empty().with_message(Message::assistant("hello")));

        assert_eq!(merged.conversation.len(), 2);
        assert_eq!(merged.conversation[0], Message::user("hi"));
        assert_eq!(merged.conversation[1], Message::assistant("hello"));
        // Original state unchanged
        assert_eq!(state.conversation.len(), 1);
    }

    #[test]
    fn test_last_write_wins_and_clear() {
        let state = populated_state();
        let merged = state.apply_update(
            StateUpdate::empty()
                .with_generated_sql("SELECT 1;")
                .clear_error()
                .with_feedback(None),
        );

        assert_eq!(merged.generated_sql, "SELECT 1;");
        assert_eq!(merged.error, None);
        assert_eq!(merged.feedback, None);
        assert_eq!(merged.db_schema, state.db_schema);
    }

    #[test]
    fn test_attempt_count_never_decreases() {
        let state = ExecutionState {
            attempt_count: 5,
            ..Default::default()
        };
        assert_eq!(state.apply_update(StateUpdate::empty().with_attempt_count(3)).attempt_count, 5);
        assert_eq!(state.apply_update(StateUpdate::empty().with_attempt_count(6)).attempt_count, 6);
    }

    #[test]
    fn test_from_json_ignores_unknown_fields() {
        let update = StateUpdate::from_json(&json!({
            "approved": true,
            "feedback": null,
            "somethingNew": 42,
            "attemptCount": "not a number"
        }));

        assert_eq!(update.approved, Some(true));
        assert_eq!(update.feedback, Some(None));
        assert_eq!(update.attempt_count, None);
        assert!(StateUpdate::from_json(&json!("scalar")).is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let value = populated_state().to_value();
        assert_eq!(value["userQuery"], "show all users");
        assert_eq!(value["queryResult"]["rowCount"], 1);
        assert_eq!(value["attemptCount"], 2);
        assert_eq!(value["conditionResult"], true);
    }

    #[test]
    fn test_final_content() {
        let mut state = populated_state();
        assert_eq!(state.final_content(), "boom");

        state.approved = true;
        assert_eq!(state.final_content(), "3 users");

        state.approved = false;
        state.error = None;
        assert_eq!(state.final_content(), "3 users");
    }

    #[test]
    fn test_decision_into_update() {
        let update = StateUpdate::from(&ApprovalDecision::reject("use LIMIT 10"));
        assert_eq!(update.approved, Some(false));
        assert_eq!(update.feedback, Some(Some("use LIMIT 10".to_string())));
    }
}
