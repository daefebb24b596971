//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies pending
//! ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_reporting_entities_table",
        sql: "CREATE TABLE reporting_entities (
            err_id TEXT PRIMARY KEY NOT NULL,
            name TEXT,
            pin TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    },
    Migration {
        version: 2,
        description: "create_expense_records_tables",
        sql: "CREATE TABLE expense_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE TABLE record_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id INTEGER NOT NULL REFERENCES expense_records(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            cells TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (record_id, position)
        );",
    },
    Migration {
        version: 3,
        description: "create_default_report_tables",
        sql: "CREATE TABLE IF NOT EXISTS report_summaries (
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
        );
        CREATE TABLE IF NOT EXISTS report_expenses (
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
        );
        CREATE INDEX IF NOT EXISTS idx_report_expenses_report ON report_expenses(err_report_id);",
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}
