use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid table name '{name}': only letters, digits and underscores are allowed")]
    InvalidTableName { name: String },
}

/// Failures of the local, CPU-bound part of the scan flow.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Uploaded file is empty")]
    EmptyInput,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Preprocessing task failed: {0}")]
    Task(String),
}

/// Failures of external collaborators (OCR, text generation, directory,
/// record store, report sink, object storage).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("OCR provider failed: {0}")]
    Ocr(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Directory lookup failed: {0}")]
    Directory(String),

    #[error("Record store failed: {0}")]
    RecordStore(String),

    #[error("Report persistence failed: {0}")]
    Persistence(String),

    #[error("Object storage failed: {0}")]
    ObjectStorage(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Operation timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A single request that does not follow the chat protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid expenses data format: {0}")]
    InvalidExpenses(#[source] serde_json::Error),

    #[error("Invalid form submission: {0}")]
    InvalidSubmission(#[source] serde_json::Error),

    #[error("No form is awaiting submission for this connection")]
    UnexpectedSubmission,

    #[error("Unknown connection '{0}'")]
    UnknownConnection(String),

    #[error("No expense report is open for this connection")]
    NoOpenReport,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Invalid object path '{0}'")]
    InvalidPath(String),
}

impl From<StorageError> for ProviderError {
    fn from(err: StorageError) -> Self {
        ProviderError::ObjectStorage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
