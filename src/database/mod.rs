//! Database access used by the schema and SQL-execute vertices.
//!
//! A [`DatabaseAccessor`] turns a connection target into a
//! [`DatabaseClient`]; the client runs statements and is released when the
//! vertex is done with it. Failures are [`DatabaseError`]s, which vertices
//! record in `ExecutionState.error` instead of aborting the run.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod schema;

pub use memory::MemoryDatabase;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAccessor;
pub use schema::{fetch_schema, format_schema, SCHEMA_COLUMNS_SQL, SCHEMA_ENUMS_SQL};

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::state::QueryResult;

/// A checked-out database connection
#[async_trait]
pub trait DatabaseClient: Send {
    /// Run one SQL statement.
    ///
    /// Row-returning statements yield one JSON object per row; other
    /// statements yield the affected row count with no rows.
    async fn query(&mut self, sql: &str) -> Result<QueryResult, DatabaseError>;

    /// Return the connection. Further queries fail.
    async fn release(&mut self);
}

/// Factory for database clients
#[async_trait]
pub trait DatabaseAccessor: Send + Sync {
    async fn connect(&self, target: &str) -> Result<Box<dyn DatabaseClient>, DatabaseError>;
}

/// Strip surrounding whitespace and trailing semicolons.
pub(crate) fn normalize_sql(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Whether a statement produces a result set that can be wrapped in a subquery
pub(crate) fn is_row_returning(sql: &str) -> bool {
    let keyword: String = normalize_sql(sql)
        .trim_start_matches('(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    matches!(
        keyword.to_ascii_uppercase().as_str(),
        "SELECT" | "WITH" | "VALUES" | "TABLE"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sql() {
        assert_eq!(normalize_sql("  SELECT 1;  "), "SELECT 1");
        assert_eq!(normalize_sql("SELECT 1 ; ;\n"), "SELECT 1");
        assert_eq!(normalize_sql(""), "");
    }

    #[test]
    fn test_is_row_returning() {
        assert!(is_row_returning("SELECT * FROM \"User\";"));
        assert!(is_row_returning("  with x as (select 1) select * from x"));
        assert!(is_row_returning("(SELECT 1)"));
        assert!(!is_row_returning("UPDATE \"User\" SET name = 'a'"));
        assert!(!is_row_returning("DELETE FROM t"));
        assert!(!is_row_returning(""));
    }
}
