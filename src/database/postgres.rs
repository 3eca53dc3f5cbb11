//! PostgreSQL database accessor (requires the `postgres` feature).
//!
//! Pools are created lazily per connection target and reused. Row-returning
//! statements are wrapped so PostgreSQL aggregates the rows into JSON:
//!
//! ```sql
//! SELECT COALESCE(json_agg(t), '[]'::json) FROM (<statement>) t
//! ```
//!
//! which keeps arbitrary column types out of Rust-side decoding.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{is_row_returning, normalize_sql, DatabaseAccessor, DatabaseClient};
use crate::error::DatabaseError;
use crate::state::QueryResult;

/// sqlx-backed accessor with one pool per target
pub struct PostgresAccessor {
    pools: RwLock<HashMap<String, PgPool>>,
    max_connections: u32,
}

impl Default for PostgresAccessor {
    fn default() -> Self {
        Self::new(5)
    }
}

impl PostgresAccessor {
    pub fn new(max_connections: u32) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            max_connections: max_connections.max(1),
        }
    }

    async fn pool(&self, target: &str) -> Result<PgPool, DatabaseError> {
        if let Some(pool) = self.pools.read().await.get(target) {
            return Ok(pool.clone());
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(target) {
            return Ok(pool.clone());
        }

        info!(max_connections = self.max_connections, "Opening PostgreSQL pool");
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(target)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        pools.insert(target.to_string(), pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl DatabaseAccessor for PostgresAccessor {
    async fn connect(&self, target: &str) -> Result<Box<dyn DatabaseClient>, DatabaseError> {
        if target.trim().is_empty() {
            return Err(DatabaseError::NoTarget);
        }

        let pool = self.pool(target).await?;
        let conn = pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Ok(Box::new(PostgresClient { conn: Some(conn) }))
    }
}

struct PostgresClient {
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn query(&mut self, sql: &str) -> Result<QueryResult, DatabaseError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DatabaseError::Query("client already released".to_string()))?;

        let statement = normalize_sql(sql);
        if statement.is_empty() {
            return Err(DatabaseError::Query("empty statement".to_string()));
        }

        if is_row_returning(statement) {
            let wrapped = format!(
                "SELECT COALESCE(json_agg(t), '[]'::json) FROM ({}) t",
                statement
            );
            let rows: Value = sqlx::query_scalar(&wrapped)
                .fetch_one(&mut **conn)
                .await
                .map_err(|e| DatabaseError::Query(e.to_string()))?;

            let rows = match rows {
                Value::Array(rows) => rows,
                other => vec![other],
            };
            debug!(rows = rows.len(), "Query returned rows");
            Ok(QueryResult::new(rows))
        } else {
            let result = sqlx::query(statement)
                .execute(&mut **conn)
                .await
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            let affected = usize::try_from(result.rows_affected()).unwrap_or(usize::MAX);
            debug!(affected, "Statement executed");
            Ok(QueryResult::affected(affected))
        }
    }

    async fn release(&mut self) {
        // Dropping the pooled connection returns it to the pool.
        self.conn.take();
    }
}
