//! Scripted in-memory database.
//!
//! Maps SQL text to canned results or failures. Used for tests and dry
//! runs where no real database is available. Every statement and
//! connection is recorded so callers can assert on what ran.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::schema::{SCHEMA_COLUMNS_SQL, SCHEMA_ENUMS_SQL};
use super::{normalize_sql, DatabaseAccessor, DatabaseClient};
use crate::error::DatabaseError;
use crate::state::QueryResult;

type Scripted = Result<QueryResult, String>;

#[derive(Debug, Default)]
struct Journal {
    connections: Vec<String>,
    executed: Vec<String>,
    releases: usize,
}

/// Scripted database accessor
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    responses: Arc<HashMap<String, Scripted>>,
    fallback: Option<Scripted>,
    connect_error: Option<String>,
    journal: Arc<Mutex<Journal>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(mut self, sql: &str, response: Scripted) -> Self {
        Arc::make_mut(&mut self.responses).insert(normalize_sql(sql).to_string(), response);
        self
    }

    /// Return `rows` for `sql`
    pub fn with_rows(self, sql: &str, rows: Vec<Value>) -> Self {
        self.script(sql, Ok(QueryResult::new(rows)))
    }

    /// Return an affected-row count for `sql`
    pub fn with_affected(self, sql: &str, count: usize) -> Self {
        self.script(sql, Ok(QueryResult::affected(count)))
    }

    /// Fail `sql` with a query error
    pub fn with_failure(self, sql: &str, message: impl Into<String>) -> Self {
        self.script(sql, Err(message.into()))
    }

    /// Script the schema introspection queries
    pub fn with_schema(self, columns: Vec<Value>, enums: Vec<Value>) -> Self {
        self.with_rows(SCHEMA_COLUMNS_SQL, columns)
            .with_rows(SCHEMA_ENUMS_SQL, enums)
    }

    /// Result for statements with no script. Without one they fail.
    pub fn with_fallback_rows(mut self, rows: Vec<Value>) -> Self {
        self.fallback = Some(Ok(QueryResult::new(rows)));
        self
    }

    /// Fail every unscripted statement with `message`
    pub fn with_fallback_failure(mut self, message: impl Into<String>) -> Self {
        self.fallback = Some(Err(message.into()));
        self
    }

    /// Refuse every connection attempt
    pub fn with_connect_error(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Statements executed so far, in order
    pub async fn executed(&self) -> Vec<String> {
        self.journal.lock().await.executed.clone()
    }

    /// Targets passed to `connect`, in order
    pub async fn connections(&self) -> Vec<String> {
        self.journal.lock().await.connections.clone()
    }

    /// Number of released clients
    pub async fn releases(&self) -> usize {
        self.journal.lock().await.releases
    }
}

#[async_trait]
impl DatabaseAccessor for MemoryDatabase {
    async fn connect(&self, target: &str) -> Result<Box<dyn DatabaseClient>, DatabaseError> {
        self.journal
            .lock()
            .await
            .connections
            .push(target.to_string());

        if let Some(message) = &self.connect_error {
            return Err(DatabaseError::Connection(message.clone()));
        }

        Ok(Box::new(MemoryClient {
            database: self.clone(),
            released: false,
        }))
    }
}

struct MemoryClient {
    database: MemoryDatabase,
    released: bool,
}

#[async_trait]
impl DatabaseClient for MemoryClient {
    async fn query(&mut self, sql: &str) -> Result<QueryResult, DatabaseError> {
        if self.released {
            return Err(DatabaseError::Query("client already released".to_string()));
        }

        let key = normalize_sql(sql);
        self.database
            .journal
            .lock()
            .await
            .executed
            .push(key.to_string());

        let scripted = self
            .database
            .responses
            .get(key)
            .or(self.database.fallback.as_ref())
            .cloned()
            .unwrap_or_else(|| Err(format!("no scripted result for: {}", key)));

        scripted.map_err(DatabaseError::Query)
    }

    async fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.database.journal.lock().await.releases += 1;
        }
    }
}
