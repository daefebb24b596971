//! Interfaces to the external collaborators the intake core depends on.
//!
//! The conversation engine and scan pipeline only ever see these traits.
//! Reference implementations live in `db` (directory, record store, report
//! sink), `storage` (object store), `processor` (OCR providers) and `ai`
//! (text generation).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Column name to value, the shape of one persisted record.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// A reporting entity known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub err_id: String,
    pub name: Option<String>,
}

/// Opaque reference to an opened record in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHandle {
    pub id: i64,
    pub name: String,
}

/// One text block returned by an OCR provider. The first annotation of a
/// response holds the full text of the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub description: String,
    #[serde(default)]
    pub locale: Option<String>,
}

impl TextAnnotation {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            locale: None,
        }
    }
}

#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    async fn find(&self, err_id: &str) -> Result<Option<DirectoryEntry>, ProviderError>;

    /// Header row for newly created expense records.
    async fn template_header(&self) -> Result<Vec<String>, ProviderError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn open(&self, name: &str) -> Result<Option<RecordHandle>, ProviderError>;

    async fn create(&self, name: &str, header: &[String]) -> Result<RecordHandle, ProviderError>;

    async fn append_row(&self, record: &RecordHandle, values: &[String])
        -> Result<(), ProviderError>;
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn insert(&self, table: &str, fields: FieldMap) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `path` and returns a URL for the stored object.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>, ProviderError>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}
