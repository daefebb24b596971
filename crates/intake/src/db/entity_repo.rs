//! Reporting entity repository for the `reporting_entities` table.
//!
//! Backs both the directory lookup used by the chat flow and the PIN check
//! used at login.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::auth::CredentialStore;
use crate::backend::{DirectoryEntry, DirectoryLookup};
use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub struct EntityRow {
    pub err_id: String,
    pub name: Option<String>,
    pub pin: String,
}

impl EntityRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            err_id: row.get("err_id")?,
            name: row.get("name")?,
            pin: row.get("pin")?,
        })
    }
}

pub fn insert(db: &Database, entity: &EntityRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO reporting_entities (err_id, name, pin) VALUES (?1, ?2, ?3)",
            params![entity.err_id, entity.name, entity.pin],
        )?;
        Ok(())
    })
}

pub fn find(db: &Database, err_id: &str) -> Result<Option<EntityRow>, DatabaseError> {
    db.with_conn(|conn| find_with(conn, err_id))
}

fn find_with(conn: &rusqlite::Connection, err_id: &str) -> Result<Option<EntityRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT err_id, name, pin FROM reporting_entities WHERE err_id = ?1",
            [err_id],
            EntityRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Directory and credential store over `reporting_entities`.
#[derive(Clone)]
pub struct SqliteDirectory {
    db: Database,
    template_header: Vec<String>,
}

impl SqliteDirectory {
    pub fn new(db: Database, template_header: Vec<String>) -> Self {
        Self {
            db,
            template_header,
        }
    }
}

#[async_trait]
impl DirectoryLookup for SqliteDirectory {
    async fn find(&self, err_id: &str) -> Result<Option<DirectoryEntry>, ProviderError> {
        let err_id = err_id.to_string();
        let row = self
            .db
            .run(move |conn| find_with(conn, &err_id))
            .await
            .map_err(|e| ProviderError::Directory(e.to_string()))?;
        Ok(row.map(|r| DirectoryEntry {
            err_id: r.err_id,
            name: r.name,
        }))
    }

    async fn template_header(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.template_header.clone())
    }
}

#[async_trait]
impl CredentialStore for SqliteDirectory {
    async fn verify(&self, err_id: &str, pin: &str) -> Result<bool, ProviderError> {
        let err_id = err_id.to_string();
        let row = self
            .db
            .run(move |conn| find_with(conn, &err_id))
            .await
            .map_err(|e| ProviderError::Directory(e.to_string()))?;
        Ok(row.is_some_and(|r| r.pin == pin))
    }
}
