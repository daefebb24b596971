pub mod ai;
pub mod auth;
pub mod backend;
pub mod broadcast;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use auth::{Authenticator, CredentialStore, Principal};
pub use backend::{
    DirectoryEntry, DirectoryLookup, FieldMap, ObjectStore, OcrProvider, RecordHandle,
    RecordStore, ReportSink, TextAnnotation, TextGenerator,
};
pub use broadcast::ChatHub;
pub use config::{load_config, load_config_from_str, Config};
pub use conversation::{
    Backends, ChatState, ConnectionId, ConversationEngine, Inbound, Outbound, Session,
    SessionStore, Upload,
};
pub use error::{
    ConfigError, IntakeError, ProcessError, ProtocolError, ProviderError, Result, StorageError,
};
pub use pipeline::{ScanError, ScanPipeline};
pub use report::{DigitizedForm, ReportAssembler, ReportSubmission};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use service::ChatService;
pub use telemetry::init_logging;
