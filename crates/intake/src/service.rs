//! Transport-facing entry point: connect, receive, disconnect.
//!
//! A transport (websocket handler, test harness) calls these and forwards
//! whatever arrives on the connection's outbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::ai::OpenAiGenerator;
use crate::auth::{Authenticator, Principal};
use crate::backend::TextGenerator;
use crate::broadcast::ChatHub;
use crate::classifier::classifier_for;
use crate::config::Config;
use crate::conversation::messages;
use crate::conversation::{
    Backends, ConnectionId, ConversationEngine, Inbound, Outbound, Session, SessionStore,
};
use crate::db::{report_repo, Database, SqliteDirectory, SqliteRecordStore, SqliteReportSink};
use crate::error::{ConfigError, IntakeError, ProtocolError};
use crate::pipeline::ScanPipeline;
use crate::processor::{ocr_provider_from_config, ImagePreprocessor, TextExtractor};
use crate::report::ReportAssembler;
use crate::sanitize::redact_connection;
use crate::storage::FileStorage;

#[derive(Clone)]
pub struct ChatService {
    auth: Arc<Authenticator>,
    engine: ConversationEngine,
    sessions: Arc<SessionStore>,
    hub: ChatHub,
}

impl ChatService {
    pub fn new(auth: Arc<Authenticator>, engine: ConversationEngine, hub: ChatHub) -> Self {
        Self {
            auth,
            engine,
            sessions: Arc::new(SessionStore::new()),
            hub,
        }
    }

    /// Wires the SQLite, filesystem and HTTP reference backends from config.
    pub fn from_config(config: &Config) -> Result<Self, IntakeError> {
        let path = config
            .database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "no database_path configured and no home directory found".to_string(),
            })?;
        let db = Database::open(&path)?;
        report_repo::ensure_tables(&db, &config.persistence)?;

        let directory = Arc::new(SqliteDirectory::new(
            db.clone(),
            config.directory.template_header.clone(),
        ));
        let backends = Backends {
            directory: directory.clone(),
            records: Arc::new(SqliteRecordStore::new(db.clone())),
            objects: Arc::new(FileStorage::from_config(&config.storage)),
        };
        let assembler = ReportAssembler::new(
            Arc::new(SqliteReportSink::new(db)),
            &config.persistence,
        );

        let generator: Option<Arc<dyn TextGenerator>> = if config.generation.enabled {
            match OpenAiGenerator::from_config(&config.generation) {
                Ok(g) => Some(Arc::new(g)),
                Err(e) => {
                    log::warn!("Text generation unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let scanner = ScanPipeline::new(
            ImagePreprocessor::new(config.scan.preprocess),
            TextExtractor::new(ocr_provider_from_config(&config.ocr)?),
            classifier_for(config.scan.strategy, generator, &config.generation),
            Duration::from_secs(config.scan.timeout_secs),
        );

        let engine = ConversationEngine::new(
            backends,
            assembler,
            scanner,
            config.conversation.form_entries,
        );
        let auth = Arc::new(Authenticator::new(
            directory,
            Duration::from_secs(config.conversation.session_ttl_secs),
        ));

        Ok(Self::new(auth, engine, ChatHub::default()))
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    pub fn hub(&self) -> &ChatHub {
        &self.hub
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Opens a session for an authenticated connection and returns its
    /// outbox. An unknown or expired token is refused with the message to
    /// send before closing.
    pub fn connect(
        &self,
        conn: ConnectionId,
        token: &str,
    ) -> Result<mpsc::UnboundedReceiver<Outbound>, Outbound> {
        let Some(principal) = self.auth.resolve(token) else {
            log::info!("Refused connection {}", redact_connection(conn.as_str()));
            return Err(Outbound::error(messages::UNAUTHORIZED));
        };

        log::info!("Connection {} opened", redact_connection(conn.as_str()));
        let outbox = self.hub.register(conn.clone());
        self.sessions.open(conn, principal);
        Ok(outbox)
    }

    /// Runs one turn and returns its messages without delivering them.
    pub async fn turn(
        &self,
        conn: &ConnectionId,
        input: Inbound,
    ) -> Result<Vec<Outbound>, ProtocolError> {
        let session = self.sessions.get(conn).ok_or_else(|| {
            ProtocolError::UnknownConnection(redact_connection(conn.as_str()))
        })?;
        let mut session = session.lock().await;
        Ok(self.engine.handle(&mut session, input).await)
    }

    /// Runs one turn and delivers its messages to that connection only.
    pub async fn receive(&self, conn: &ConnectionId, input: Inbound) -> Result<usize, ProtocolError> {
        let outputs = self.turn(conn, input).await?;
        Ok(self.hub.send(conn, outputs))
    }

    /// Replaces the connection's session with a fresh one for the same
    /// principal.
    pub async fn reset(&self, conn: &ConnectionId) -> Result<(), ProtocolError> {
        let session = self.sessions.get(conn).ok_or_else(|| {
            ProtocolError::UnknownConnection(redact_connection(conn.as_str()))
        })?;
        let mut session = session.lock().await;
        let principal: Principal = session.principal().clone();
        *session = Session::new(conn.clone(), principal);
        Ok(())
    }

    pub fn disconnect(&self, conn: &ConnectionId) {
        self.hub.unregister(conn);
        if self.sessions.remove(conn) {
            log::info!("Connection {} closed", redact_connection(conn.as_str()));
        }
    }
}
