//! Schema introspection for the schema vertex.
//!
//! Reads table/column metadata from `information_schema` and enum labels
//! from `pg_enum`, then renders them as compact text for the SQL prompt:
//!
//! ```text
//! Table "User":
//!   - id: integer NOT NULL
//!   - email: text NULL
//!
//! Enum "Role": ADMIN, USER
//! ```

use serde_json::Value;
use std::collections::BTreeMap;

use super::DatabaseClient;
use crate::error::DatabaseError;
use crate::state::QueryResult;

pub const SCHEMA_COLUMNS_SQL: &str = "SELECT table_name, column_name, data_type, is_nullable \
     FROM information_schema.columns \
     WHERE table_schema = 'public' \
     ORDER BY table_name, ordinal_position";

pub const SCHEMA_ENUMS_SQL: &str = "SELECT t.typname AS enum_name, e.enumlabel AS enum_value \
     FROM pg_type t \
     JOIN pg_enum e ON t.oid = e.enumtypid \
     JOIN pg_namespace n ON n.oid = t.typnamespace \
     WHERE n.nspname = 'public' \
     ORDER BY t.typname, e.enumsortorder";

/// Fetch and format the schema through an open client.
pub async fn fetch_schema(client: &mut dyn DatabaseClient) -> Result<String, DatabaseError> {
    let columns = client.query(SCHEMA_COLUMNS_SQL).await?;
    let enums = client.query(SCHEMA_ENUMS_SQL).await?;
    Ok(format_schema(&columns, &enums))
}

fn text<'a>(row: &'a Value, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Render column and enum rows as prompt text. Row order within a table is kept.
pub fn format_schema(columns: &QueryResult, enums: &QueryResult) -> String {
    let mut tables: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for row in &columns.rows {
        let nullable = if text(row, "is_nullable").eq_ignore_ascii_case("YES") {
            "NULL"
        } else {
            "NOT NULL"
        };
        tables.entry(text(row, "table_name")).or_default().push(format!(
            "  - {}: {} {}",
            text(row, "column_name"),
            text(row, "data_type"),
            nullable
        ));
    }

    let mut enum_values: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for row in &enums.rows {
        enum_values
            .entry(text(row, "enum_name"))
            .or_default()
            .push(text(row, "enum_value"));
    }

    let mut sections: Vec<String> = tables
        .into_iter()
        .map(|(table, columns)| format!("Table \"{}\":\n{}", table, columns.join("\n")))
        .collect();

    sections.extend(
        enum_values
            .into_iter()
            .map(|(name, values)| format!("Enum \"{}\": {}", name, values.join(", "))),
    );

    sections.join("\n\n")
}
