//! Expense record store: named records holding ordered rows of cells.
//!
//! Row 0 of a record is its header. Cells are stored as a JSON array.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DatabaseError};
use crate::backend::{RecordHandle, RecordStore};
use crate::error::ProviderError;

fn open_with(conn: &Connection, name: &str) -> Result<Option<RecordHandle>, DatabaseError> {
    let handle = conn
        .query_row(
            "SELECT id, name FROM expense_records WHERE name = ?1",
            [name],
            |r| {
                Ok(RecordHandle {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(handle)
}

fn append_with(conn: &Connection, record_id: i64, cells: &[String]) -> Result<(), DatabaseError> {
    let encoded = serde_json::to_string(cells)?;
    conn.execute(
        "INSERT INTO record_rows (record_id, position, cells)
         VALUES (?1, (SELECT COALESCE(MAX(position) + 1, 0) FROM record_rows WHERE record_id = ?1), ?2)",
        params![record_id, encoded],
    )?;
    Ok(())
}

/// Opens a record by name.
pub fn open(db: &Database, name: &str) -> Result<Option<RecordHandle>, DatabaseError> {
    db.with_conn(|conn| open_with(conn, name))
}

/// Creates a record with `header` as its first row. If a record with that
/// name already exists it is returned unchanged.
pub fn create(db: &Database, name: &str, header: &[String]) -> Result<RecordHandle, DatabaseError> {
    db.with_conn(|conn| create_with(conn, name, header))
}

fn create_with(
    conn: &Connection,
    name: &str,
    header: &[String],
) -> Result<RecordHandle, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO expense_records (name) VALUES (?1)",
        [name],
    )?;
    let handle = open_with(conn, name)?.ok_or(DatabaseError::Sqlite(
        rusqlite::Error::QueryReturnedNoRows,
    ))?;
    if inserted == 1 {
        append_with(conn, handle.id, header)?;
        log::info!("Created expense record '{}'", name);
    }
    Ok(handle)
}

pub fn append_row(db: &Database, record: &RecordHandle, cells: &[String]) -> Result<(), DatabaseError> {
    db.with_conn(|conn| append_with(conn, record.id, cells))
}

/// All rows of a record in order, header first.
pub fn rows(db: &Database, record: &RecordHandle) -> Result<Vec<Vec<String>>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT cells FROM record_rows WHERE record_id = ?1 ORDER BY position",
        )?;
        let encoded = stmt
            .query_map([record.id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        encoded
            .iter()
            .map(|cells| serde_json::from_str(cells).map_err(DatabaseError::from))
            .collect()
    })
}

#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn store_error(e: DatabaseError) -> ProviderError {
    ProviderError::RecordStore(e.to_string())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn open(&self, name: &str) -> Result<Option<RecordHandle>, ProviderError> {
        let name = name.to_string();
        self.db
            .run(move |conn| open_with(conn, &name))
            .await
            .map_err(store_error)
    }

    async fn create(&self, name: &str, header: &[String]) -> Result<RecordHandle, ProviderError> {
        let name = name.to_string();
        let header = header.to_vec();
        self.db
            .run(move |conn| create_with(conn, &name, &header))
            .await
            .map_err(store_error)
    }

    async fn append_row(
        &self,
        record: &RecordHandle,
        values: &[String],
    ) -> Result<(), ProviderError> {
        let record_id = record.id;
        let values = values.to_vec();
        self.db
            .run(move |conn| append_with(conn, record_id, &values))
            .await
            .map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        vec!["Description".to_string(), "Amount".to_string()]
    }

    #[test]
    fn test_create_writes_header() {
        let db = Database::open_in_memory().unwrap();
        let handle = create(&db, "ERR ERR1", &header()).unwrap();
        assert_eq!(handle.name, "ERR ERR1");
        assert_eq!(rows(&db, &handle).unwrap(), vec![header()]);
    }

    #[test]
    fn test_create_existing_returns_same_record() {
        let db = Database::open_in_memory().unwrap();
        let first = create(&db, "ERR ERR1", &header()).unwrap();
        let second = create(&db, "ERR ERR1", &["Other".to_string()]).unwrap();
        assert_eq!(first, second);
        assert_eq!(rows(&db, &first).unwrap().len(), 1);
    }

    #[test]
    fn test_append_keeps_order() {
        let db = Database::open_in_memory().unwrap();
        let handle = create(&db, "ERR ERR1", &header()).unwrap();
        append_row(&db, &handle, &["Rice".to_string(), "45.00".to_string()]).unwrap();
        append_row(&db, &handle, &["Oil".to_string(), "12.00".to_string()]).unwrap();
        let all = rows(&db, &handle).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1][0], "Rice");
        assert_eq!(all[2][0], "Oil");
    }

    #[tokio::test]
    async fn test_record_store_trait() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteRecordStore::new(db.clone());
        assert!(store.open("ERR ERR2").await.unwrap().is_none());
        let handle = store.create("ERR ERR2", &header()).await.unwrap();
        assert_eq!(store.open("ERR ERR2").await.unwrap(), Some(handle.clone()));
        store
            .append_row(&handle, &["Water".to_string(), "3.00".to_string()])
            .await
            .unwrap();
        assert_eq!(rows(&db, &handle).unwrap().len(), 2);
    }
}
