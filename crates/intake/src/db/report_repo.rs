//! Report summary and expense line tables.
//!
//! Table names come from configuration, so every name is checked with
//! [`is_valid_table_name`] before it is spliced into SQL. Column names come
//! from the record being inserted and are checked the same way.

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;

use super::{Database, DatabaseError};
use crate::backend::{FieldMap, ReportSink};
use crate::config::{is_valid_table_name, PersistenceConfig};
use crate::error::ProviderError;

fn checked(name: &str) -> Result<&str, DatabaseError> {
    if is_valid_table_name(name) {
        Ok(name)
    } else {
        Err(DatabaseError::InvalidIdentifier(name.to_string()))
    }
}

fn summary_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            err_id TEXT NOT NULL,
            err_report_id TEXT NOT NULL,
            report_date TEXT,
            total_expenses REAL NOT NULL DEFAULT 0,
            total_grant REAL NOT NULL DEFAULT 0,
            total_other_sources REAL NOT NULL DEFAULT 0,
            excess_expenses TEXT,
            surplus_use TEXT,
            lessons TEXT,
            training TEXT,
            files TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"
    )
}

fn expenses_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            err_report_id TEXT NOT NULL,
            expense_activity TEXT,
            expense_description TEXT,
            payment_date TEXT,
            seller TEXT,
            payment_method TEXT,
            receipt_no TEXT,
            expense_amount REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"
    )
}

/// Creates the configured report tables if they do not exist yet. The
/// default names are already created by migration.
pub fn ensure_tables(db: &Database, config: &PersistenceConfig) -> Result<(), DatabaseError> {
    let summary = checked(&config.summary_table)?;
    let expenses = checked(&config.expenses_table)?;
    db.with_conn(|conn| {
        conn.execute_batch(&summary_table_ddl(summary))?;
        conn.execute_batch(&expenses_table_ddl(expenses))?;
        Ok(())
    })
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Value::from(f),
        SqlValue::Text(s) => Value::from(s),
        SqlValue::Blob(b) => Value::from(b),
    }
}

fn insert_with(conn: &Connection, table: &str, fields: &FieldMap) -> Result<i64, DatabaseError> {
    let table = checked(table)?;
    let columns = fields
        .keys()
        .map(|k| checked(k))
        .collect::<Result<Vec<_>, _>>()?;
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    );

    conn.execute(
        &sql,
        rusqlite::params_from_iter(fields.values().map(to_sql_value)),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts one record and returns its row id.
pub fn insert(db: &Database, table: &str, fields: &FieldMap) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| insert_with(conn, table, fields))
}

/// Every row of `table` in insertion order, `id` and `created_at` included.
pub fn fetch_all(db: &Database, table: &str) -> Result<Vec<FieldMap>, DatabaseError> {
    let table = checked(table)?;
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY id"))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt
            .query_map([], |row| {
                let mut map = FieldMap::new();
                for (i, name) in names.iter().enumerate() {
                    map.insert(name.clone(), from_sql_value(row.get(i)?));
                }
                Ok(map)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[derive(Clone)]
pub struct SqliteReportSink {
    db: Database,
}

impl SqliteReportSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportSink for SqliteReportSink {
    async fn insert(&self, table: &str, fields: FieldMap) -> Result<(), ProviderError> {
        let table = table.to_string();
        self.db
            .run(move |conn| insert_with(conn, &table, &fields))
            .await
            .map(|id| log::debug!("Inserted row {}", id))
            .map_err(|e| ProviderError::Persistence(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_insert_and_fetch_summary() {
        let db = Database::open_in_memory().unwrap();
        insert(
            &db,
            "report_summaries",
            &fields(json!({
                "err_id": "ERR1",
                "err_report_id": "ERR1123456",
                "report_date": "2024-03-01",
                "total_expenses": 57.5,
                "total_grant": 100,
                "files": "[\"a.png\"]"
            })),
        )
        .unwrap();

        let rows = fetch_all(&db, "report_summaries").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["err_report_id"], "ERR1123456");
        assert_eq!(rows[0]["total_expenses"], 57.5);
        assert_eq!(rows[0]["total_grant"], 100.0);
        assert_eq!(rows[0]["files"], "[\"a.png\"]");
        assert_eq!(rows[0]["surplus_use"], Value::Null);
    }

    #[test]
    fn test_nested_values_stored_as_json_text() {
        let db = Database::open_in_memory().unwrap();
        insert(
            &db,
            "report_summaries",
            &fields(json!({"err_id": "E", "err_report_id": "R", "files": ["x", "y"]})),
        )
        .unwrap();
        let rows = fetch_all(&db, "report_summaries").unwrap();
        assert_eq!(rows[0]["files"], "[\"x\",\"y\"]");
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let db = Database::open_in_memory().unwrap();
        let result = insert(&db, "report_summaries; DROP", &fields(json!({"err_id": "E"})));
        assert!(matches!(result, Err(DatabaseError::InvalidIdentifier(_))));

        let result = insert(&db, "report_summaries", &fields(json!({"err id": "E"})));
        assert!(matches!(result, Err(DatabaseError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_unknown_column_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = insert(&db, "report_expenses", &fields(json!({"nope": 1})));
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn test_ensure_custom_tables() {
        let db = Database::open_in_memory().unwrap();
        let config = PersistenceConfig {
            summary_table: "summaries_v2".to_string(),
            expenses_table: "expenses_v2".to_string(),
        };
        ensure_tables(&db, &config).unwrap();
        ensure_tables(&db, &config).unwrap();
        insert(
            &db,
            "expenses_v2",
            &fields(json!({"err_report_id": "R", "expense_amount": 12.5})),
        )
        .unwrap();
        assert_eq!(fetch_all(&db, "expenses_v2").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sink_maps_errors() {
        let sink = SqliteReportSink::new(Database::open_in_memory().unwrap());
        sink.insert(
            "report_expenses",
            fields(json!({"err_report_id": "R", "expense_amount": 3})),
        )
        .await
        .unwrap();
        let err = sink
            .insert("missing_table", fields(json!({"a": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Persistence(_)));
    }
}
