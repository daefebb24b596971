//! Test harness for isolated conversation tests.
//!
//! The `TestHarness` wires a `ChatService` over:
//! - an in-memory SQLite database seeded with reporting entities
//! - filesystem object storage in a temporary directory
//! - scripted OCR and text-generation providers

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;

use intake::backend::{FieldMap, OcrProvider, TextGenerator};
use intake::broadcast::ChatHub;
use intake::classifier::classifier_for;
use intake::config::{ClassifierStrategy, DirectoryConfig, GenerationConfig, PersistenceConfig, PreprocessPolicy};
use intake::conversation::{
    Backends, ChatState, ConnectionId, ConversationEngine, Inbound, Outbound, Upload,
};
use intake::db::{
    entity_repo, record_repo, report_repo, Database, EntityRow, SqliteDirectory,
    SqliteRecordStore, SqliteReportSink,
};
use intake::pipeline::ScanPipeline;
use intake::processor::{ImagePreprocessor, TextExtractor};
use intake::report::ReportAssembler;
use intake::storage::FileStorage;
use intake::{Authenticator, ChatService};

use super::builders::ScriptedOcr;

pub const FILES_URL: &str = "https://files.test";

/// Entities every harness starts with: ERR ID, name, PIN.
const SEEDED: &[(&str, Option<&str>, &str)] = &[
    ("ERR999", Some("Omdurman ERR"), "1234"),
    ("ERR1", Some("Khartoum ERR"), "4321"),
    ("ERR2", None, "1111"),
];

pub struct HarnessOptions {
    pub ocr: Arc<dyn OcrProvider>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub strategy: ClassifierStrategy,
    pub scan_timeout: Duration,
    pub form_entries: usize,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            ocr: Arc::new(ScriptedOcr::text("")),
            generator: None,
            strategy: ClassifierStrategy::Table,
            scan_timeout: Duration::from_secs(10),
            form_entries: 5,
        }
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub service: ChatService,
    pub storage_root: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage_root = temp_dir.path().join("uploads");

        let db = Database::open_in_memory().expect("Failed to open database");
        for (err_id, name, pin) in SEEDED {
            entity_repo::insert(
                &db,
                &EntityRow {
                    err_id: err_id.to_string(),
                    name: name.map(str::to_string),
                    pin: pin.to_string(),
                },
            )
            .expect("Failed to seed entity");
        }

        let directory = Arc::new(SqliteDirectory::new(
            db.clone(),
            DirectoryConfig::default().template_header,
        ));
        let backends = Backends {
            directory: directory.clone(),
            records: Arc::new(SqliteRecordStore::new(db.clone())),
            objects: Arc::new(FileStorage::new(&storage_root).with_public_base_url(FILES_URL)),
        };
        let assembler = ReportAssembler::new(
            Arc::new(SqliteReportSink::new(db.clone())),
            &PersistenceConfig::default(),
        );
        let scanner = ScanPipeline::new(
            ImagePreprocessor::new(PreprocessPolicy::SmoothContrast),
            TextExtractor::new(options.ocr),
            classifier_for(
                options.strategy,
                options.generator,
                &GenerationConfig::default(),
            ),
            options.scan_timeout,
        );
        let engine = ConversationEngine::new(backends, assembler, scanner, options.form_entries);
        let auth = Arc::new(Authenticator::new(directory, Duration::from_secs(3600)));
        let service = ChatService::new(auth, engine, ChatHub::default());

        Self {
            temp_dir,
            db,
            service,
            storage_root,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Logs in as a seeded entity and opens a connection for it.
    pub async fn connect(&self, conn: &str, err_id: &str) -> ConnectionId {
        let pin = SEEDED
            .iter()
            .find(|(id, _, _)| *id == err_id)
            .map(|(_, _, pin)| *pin)
            .expect("entity is not seeded");
        let token = self
            .service
            .authenticator()
            .login(err_id, pin)
            .await
            .expect("login failed")
            .expect("credentials rejected");

        let id = ConnectionId::new(conn);
        self.service
            .connect(id.clone(), &token)
            .expect("connection refused");
        id
    }

    /// Connects and sends the first message, leaving the session at the menu.
    pub async fn connect_at_menu(&self, conn: &str, err_id: &str) -> ConnectionId {
        let id = self.connect(conn, err_id).await;
        self.say(&id, "hello").await;
        id
    }

    pub async fn say(&self, conn: &ConnectionId, text: &str) -> Vec<Outbound> {
        self.service
            .turn(conn, Inbound::Text(text.to_string()))
            .await
            .expect("unknown connection")
    }

    pub async fn upload(
        &self,
        conn: &ConnectionId,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> Vec<Outbound> {
        let upload = Upload {
            bytes,
            content_type: content_type.to_string(),
            filename: filename.map(str::to_string),
        };
        self.service
            .turn(conn, Inbound::Upload(upload))
            .await
            .expect("unknown connection")
    }

    pub async fn submit(&self, conn: &ConnectionId, payload: Value) -> Vec<Outbound> {
        self.service
            .turn(conn, Inbound::Submit(payload))
            .await
            .expect("unknown connection")
    }

    pub async fn state(&self, conn: &ConnectionId) -> ChatState {
        let session = self
            .service
            .sessions()
            .get(conn)
            .expect("no session for connection");
        let state = session.lock().await.state;
        state
    }

    /// Rows of the `ERR <id>` record, header first. Empty if it does not exist.
    pub fn record_rows(&self, err_id: &str) -> Vec<Vec<String>> {
        record_repo::open(&self.db, &format!("ERR {}", err_id))
            .expect("record lookup failed")
            .map(|handle| record_repo::rows(&self.db, &handle).expect("row read failed"))
            .unwrap_or_default()
    }

    pub fn summaries(&self) -> Vec<FieldMap> {
        report_repo::fetch_all(&self.db, "report_summaries").expect("summary read failed")
    }

    pub fn expenses(&self) -> Vec<FieldMap> {
        report_repo::fetch_all(&self.db, "report_expenses").expect("expense read failed")
    }
}

/// The text messages of a turn, in order.
pub fn texts(outputs: &[Outbound]) -> Vec<String> {
    outputs
        .iter()
        .filter_map(|o| match o {
            Outbound::Text { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}
