use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::backend::{DirectoryLookup, ObjectStore, RecordStore};
use crate::error::{IntakeError, ProtocolError};
use crate::pipeline::ScanPipeline;
use crate::report::{
    parse_amount, DigitizedForm, FormSubmission, PendingExpense, ReportAssembler,
};
use crate::sanitize::redact_connection;

use super::forms::{MultiEntryForm, PrefilledForm};
use super::messages;
use super::session::{ReportContext, Session};
use super::state::ChatState;

/// A file sent over the chat connection.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Inbound {
    Text(String),
    Upload(Upload),
    /// The structured multi-entry form, as submitted by the client.
    Submit(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Text { text: String },
    Form { form: MultiEntryForm },
    Prefilled { form: PrefilledForm, narrative: String },
    ResetForm,
    Error { message: String },
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Text { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Outbound::Error {
            message: message.into(),
        }
    }
}

/// Session data changed by a turn, applied together with the new state.
#[derive(Debug, Default)]
pub enum SessionUpdate {
    #[default]
    Keep,
    /// Drops everything held for the session.
    Reset,
    ClearReport,
    OpenReport(ReportContext),
    SetPending(PendingExpense),
    HoldScan(DigitizedForm),
    ClearScan,
}

/// The outcome of one turn, computed from a snapshot of the session.
#[derive(Debug)]
pub struct Transition {
    pub outputs: Vec<Outbound>,
    pub next: ChatState,
    pub update: SessionUpdate,
}

impl Transition {
    fn reply(next: ChatState, text: impl Into<String>) -> Self {
        Self {
            outputs: vec![Outbound::text(text)],
            next,
            update: SessionUpdate::Keep,
        }
    }

    fn with(mut self, update: SessionUpdate) -> Self {
        self.update = update;
        self
    }

    /// Applies the transition and returns what should be sent. Empty texts
    /// are dropped.
    pub fn commit(self, session: &mut Session) -> Vec<Outbound> {
        session.state = self.next;
        match self.update {
            SessionUpdate::Keep => {}
            SessionUpdate::Reset => {
                session.report = None;
                session.pending = None;
                session.scanned = None;
            }
            SessionUpdate::ClearReport => {
                session.report = None;
                session.pending = None;
            }
            SessionUpdate::OpenReport(report) => {
                session.report = Some(report);
                session.pending = Some(PendingExpense::default());
            }
            SessionUpdate::SetPending(pending) => session.pending = Some(pending),
            SessionUpdate::HoldScan(form) => session.scanned = Some(form),
            SessionUpdate::ClearScan => session.scanned = None,
        }

        self.outputs
            .into_iter()
            .filter(|o| !matches!(o, Outbound::Text { text } if text.trim().is_empty()))
            .collect()
    }
}

/// The collaborators the chat flow reads from and writes to.
#[derive(Clone)]
pub struct Backends {
    pub directory: Arc<dyn DirectoryLookup>,
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
}

/// Drives one connection's conversation, one turn at a time.
#[derive(Clone)]
pub struct ConversationEngine {
    backends: Backends,
    assembler: ReportAssembler,
    scanner: ScanPipeline,
    form_entries: usize,
}

impl ConversationEngine {
    pub fn new(
        backends: Backends,
        assembler: ReportAssembler,
        scanner: ScanPipeline,
        form_entries: usize,
    ) -> Self {
        Self {
            backends,
            assembler,
            scanner,
            form_entries,
        }
    }

    /// Handles one inbound event. The session is only modified once the
    /// turn has finished; a failed turn leaves it as it was.
    pub async fn handle(&self, session: &mut Session, input: Inbound) -> Vec<Outbound> {
        let span = info_span!(
            "conversation.turn",
            conn = %redact_connection(session.id().as_str()),
            state = %session.state,
        );

        async {
            match self.transition(session, input).await {
                Ok(transition) => {
                    if transition.next != session.state {
                        log::debug!("State {} -> {}", session.state, transition.next);
                    }
                    transition.commit(session)
                }
                Err(e) => {
                    log::error!("Turn failed in state {}: {}", session.state, e);
                    vec![Outbound::text(messages::APOLOGY)]
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Computes the transition for `input` without touching the session.
    pub async fn transition(
        &self,
        session: &Session,
        input: Inbound,
    ) -> Result<Transition, IntakeError> {
        match input {
            Inbound::Text(text) => self.on_text(session, &text).await,
            Inbound::Upload(upload) => self.on_upload(session, upload).await,
            Inbound::Submit(payload) => self.on_submit(session, payload).await,
        }
    }

    async fn on_text(&self, session: &Session, raw: &str) -> Result<Transition, IntakeError> {
        let input = raw.trim();
        let msg = input.to_lowercase();

        if session.state == ChatState::Unstarted || msg == "start" {
            return Ok(Transition::reply(ChatState::Initial, messages::MENU)
                .with(SessionUpdate::Reset));
        }

        match session.state {
            ChatState::Unstarted | ChatState::Initial => Ok(self.on_menu(&msg)),
            ChatState::AwaitingId => self.on_err_id(input).await,
            ChatState::AwaitingDescription => {
                let mut pending = pending_of(session)?;
                pending.description = Some(input.to_string());
                Ok(Transition::reply(ChatState::AwaitingVendor, messages::ASK_VENDOR)
                    .with(SessionUpdate::SetPending(pending)))
            }
            ChatState::AwaitingVendor => {
                let mut pending = pending_of(session)?;
                pending.vendor = Some(input.to_string());
                Ok(Transition::reply(ChatState::AwaitingReceipt, messages::ASK_RECEIPT)
                    .with(SessionUpdate::SetPending(pending)))
            }
            ChatState::AwaitingReceipt => {
                let mut pending = pending_of(session)?;
                pending.receipt = Some(input.to_string());
                Ok(Transition::reply(ChatState::AwaitingAmount, messages::ASK_AMOUNT)
                    .with(SessionUpdate::SetPending(pending)))
            }
            ChatState::AwaitingAmount => self.on_amount(session, input).await,
            ChatState::AwaitingNext => Ok(match msg.as_str() {
                "1" => Transition::reply(
                    ChatState::AwaitingDescription,
                    messages::ASK_ANOTHER_DESCRIPTION,
                )
                .with(SessionUpdate::SetPending(PendingExpense::default())),
                "2" => {
                    log::info!("Chat report finished");
                    Transition::reply(ChatState::Initial, messages::REPORT_SUBMITTED)
                        .with(SessionUpdate::ClearReport)
                }
                _ => Transition::reply(ChatState::AwaitingNext, messages::CHOOSE_NEXT),
            }),
            ChatState::AwaitingScan => Ok(Transition::reply(
                ChatState::AwaitingScan,
                messages::SCAN_REPROMPT,
            )),
            ChatState::AwaitingFormFill => {
                Ok(Transition::reply(session.state, messages::echo(input)))
            }
        }
    }

    fn on_menu(&self, msg: &str) -> Transition {
        match msg {
            "1" | "menu" => Transition::reply(ChatState::Initial, messages::MENU),
            "2" | "report" => Transition::reply(ChatState::AwaitingId, messages::ASK_ERR_ID),
            "report v2" | "report (v2)" => Transition {
                outputs: vec![Outbound::Form {
                    form: MultiEntryForm::new(self.form_entries),
                }],
                next: ChatState::AwaitingFormFill,
                update: SessionUpdate::Keep,
            },
            "scan" | "scan form" => {
                Transition::reply(ChatState::AwaitingScan, messages::ASK_SCAN_UPLOAD)
            }
            _ => Transition::reply(ChatState::Initial, messages::INVALID_OPTION),
        }
    }

    async fn on_err_id(&self, text: &str) -> Result<Transition, IntakeError> {
        let err_id = text.to_uppercase();
        if err_id.is_empty() {
            return Ok(Transition::reply(
                ChatState::AwaitingId,
                messages::ERR_ID_NOT_FOUND,
            ));
        }

        let Some(entry) = self.backends.directory.find(&err_id).await? else {
            log::info!("ERR ID lookup found no entry");
            return Ok(Transition::reply(
                ChatState::AwaitingId,
                messages::ERR_ID_NOT_FOUND,
            ));
        };

        let record_name = format!("ERR {}", entry.err_id);
        let (record, prompt) = match self.backends.records.open(&record_name).await? {
            Some(record) => (record, messages::existing_report(&entry.err_id)),
            None => {
                let header = self.backends.directory.template_header().await?;
                let record = self.backends.records.create(&record_name, &header).await?;
                (record, messages::new_report(&entry.err_id))
            }
        };

        Ok(
            Transition::reply(ChatState::AwaitingDescription, prompt).with(
                SessionUpdate::OpenReport(ReportContext {
                    err_id: entry.err_id,
                    record,
                }),
            ),
        )
    }

    async fn on_amount(&self, session: &Session, text: &str) -> Result<Transition, IntakeError> {
        let Some(amount) = parse_amount(text) else {
            return Ok(Transition::reply(
                ChatState::AwaitingAmount,
                messages::INVALID_AMOUNT,
            ));
        };

        let report = report_of(session)?;
        let mut pending = pending_of(session)?;
        pending.amount = Some(format!("{:.2}", amount));

        let row = ReportAssembler::chat_row(&pending, chrono::Local::now().naive_local());
        self.backends
            .records
            .append_row(&report.record, &row)
            .await?;
        log::info!("Appended expense row to '{}'", report.record.name);

        Ok(Transition::reply(ChatState::AwaitingNext, messages::ASK_NEXT)
            .with(SessionUpdate::SetPending(pending)))
    }

    async fn on_upload(&self, session: &Session, upload: Upload) -> Result<Transition, IntakeError> {
        match session.state {
            ChatState::AwaitingReceipt => {
                let report = report_of(session)?;
                let mut pending = pending_of(session)?;

                let content_type = content_type_of(&upload);
                let path = format!(
                    "receipts/{}/{}.{}",
                    report.err_id,
                    Uuid::new_v4(),
                    extension_of(&upload, &content_type)
                );
                let url = self
                    .backends
                    .objects
                    .upload(&path, upload.bytes, &content_type)
                    .await?;
                pending.receipt = Some(url);

                Ok(Transition::reply(ChatState::AwaitingAmount, messages::ASK_AMOUNT)
                    .with(SessionUpdate::SetPending(pending)))
            }
            ChatState::AwaitingScan => Ok(self.on_scan(upload).await),
            ChatState::Unstarted => Ok(Transition::reply(ChatState::Initial, messages::MENU)
                .with(SessionUpdate::Reset)),
            _ => {
                let name = upload.filename.as_deref().unwrap_or("file");
                Ok(Transition::reply(session.state, messages::echo(name)))
            }
        }
    }

    async fn on_scan(&self, upload: Upload) -> Transition {
        match self.scanner.run(upload.bytes).await {
            Ok(form) => Transition {
                outputs: vec![
                    Outbound::Prefilled {
                        form: PrefilledForm::from(&form),
                        narrative: form.narrative.clone(),
                    },
                    Outbound::text(messages::SCAN_REVIEW),
                ],
                next: ChatState::Initial,
                update: SessionUpdate::HoldScan(form),
            },
            Err(e) => {
                log::warn!("Scan failed: {}", e);
                Transition::reply(ChatState::Initial, messages::SCAN_FAILED)
            }
        }
    }

    async fn on_submit(&self, session: &Session, payload: Value) -> Result<Transition, IntakeError> {
        if session.state != ChatState::AwaitingFormFill {
            if let Some(scanned) = &session.scanned {
                return self.on_confirm_scan(session, scanned, payload).await;
            }
            log::warn!("{}", ProtocolError::UnexpectedSubmission);
            return Ok(rejected(session, messages::NO_FORM_PENDING));
        }

        let form: FormSubmission = match serde_json::from_value(payload) {
            Ok(form) => form,
            Err(e) => {
                log::warn!("{}", ProtocolError::InvalidSubmission(e));
                return Ok(rejected(session, messages::FORM_INVALID));
            }
        };

        let submission = match ReportAssembler::from_form(&session.principal().err_id, &form) {
            Ok(submission) => submission,
            Err(e) => {
                log::warn!("{}", e);
                return Ok(rejected(session, messages::FORM_INVALID));
            }
        };

        self.assembler.persist(&submission).await?;
        log::info!(
            "Report {} stored with {} expense lines",
            submission.report_id,
            submission.lines().len()
        );

        Ok(Transition {
            outputs: vec![
                Outbound::text(messages::FORM_SUBMITTED),
                Outbound::ResetForm,
            ],
            next: ChatState::Initial,
            update: SessionUpdate::ClearReport,
        })
    }

    /// Stores a reviewed scan. An empty payload confirms the scan as read;
    /// otherwise the payload is the pre-filled form with the user's edits.
    async fn on_confirm_scan(
        &self,
        session: &Session,
        scanned: &DigitizedForm,
        payload: Value,
    ) -> Result<Transition, IntakeError> {
        let unchanged = payload.is_null() || payload.as_object().is_some_and(|o| o.is_empty());
        let confirmed = if unchanged {
            scanned.clone()
        } else {
            match serde_json::from_value::<PrefilledForm>(payload) {
                Ok(edited) => edited.apply_to(scanned),
                Err(e) => {
                    log::warn!("{}", ProtocolError::InvalidSubmission(e));
                    return Ok(rejected(session, messages::FORM_INVALID));
                }
            }
        };

        let submission = ReportAssembler::from_digitized(&session.principal().err_id, &confirmed);
        self.assembler.persist(&submission).await?;
        log::info!(
            "Scanned report {} stored with {} expense lines",
            submission.report_id,
            submission.lines().len()
        );

        Ok(Transition {
            outputs: vec![
                Outbound::text(messages::SCAN_SUBMITTED),
                Outbound::ResetForm,
            ],
            next: session.state,
            update: SessionUpdate::ClearScan,
        })
    }
}

fn rejected(session: &Session, message: &str) -> Transition {
    Transition {
        outputs: vec![Outbound::error(message)],
        next: session.state,
        update: SessionUpdate::Keep,
    }
}

fn report_of(session: &Session) -> Result<&ReportContext, ProtocolError> {
    session.report.as_ref().ok_or(ProtocolError::NoOpenReport)
}

fn pending_of(session: &Session) -> Result<PendingExpense, ProtocolError> {
    report_of(session)?;
    Ok(session.pending.clone().unwrap_or_default())
}

fn content_type_of(upload: &Upload) -> String {
    if !upload.content_type.trim().is_empty() {
        return upload.content_type.trim().to_string();
    }
    upload
        .filename
        .as_deref()
        .map(|name| mime_guess::from_path(name).first_or_octet_stream().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// File extension for a stored upload: the uploaded name's, else one known
/// for the content type, else `bin`.
fn extension_of(upload: &Upload, content_type: &str) -> String {
    let from_name = upload
        .filename
        .as_deref()
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext.to_ascii_lowercase();
    }

    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::conversation::session::ConnectionId;

    fn session(state: ChatState) -> Session {
        let mut session = Session::new(
            ConnectionId::new("c1"),
            Principal {
                err_id: "ERR1".to_string(),
            },
        );
        session.state = state;
        session
    }

    fn upload(filename: Option<&str>, content_type: &str) -> Upload {
        Upload {
            bytes: vec![1, 2, 3],
            content_type: content_type.to_string(),
            filename: filename.map(str::to_string),
        }
    }

    #[test]
    fn test_commit_drops_empty_text() {
        let mut s = session(ChatState::Initial);
        let outputs = Transition::reply(ChatState::AwaitingId, "  ").commit(&mut s);
        assert!(outputs.is_empty());
        assert_eq!(s.state, ChatState::AwaitingId);
    }

    #[test]
    fn test_commit_clear_report() {
        let mut s = session(ChatState::AwaitingNext);
        s.pending = Some(PendingExpense::default());
        Transition::reply(ChatState::Initial, "x")
            .with(SessionUpdate::ClearReport)
            .commit(&mut s);
        assert!(s.pending.is_none());
        assert!(s.report.is_none());
    }

    #[test]
    fn test_commit_hold_and_reset_scan() {
        let mut s = session(ChatState::AwaitingScan);
        Transition::reply(ChatState::Initial, "x")
            .with(SessionUpdate::HoldScan(DigitizedForm::default()))
            .commit(&mut s);
        assert!(s.scanned.is_some());

        Transition::reply(ChatState::Initial, "x")
            .with(SessionUpdate::ClearReport)
            .commit(&mut s);
        assert!(s.scanned.is_some());

        Transition::reply(ChatState::Initial, "x")
            .with(SessionUpdate::Reset)
            .commit(&mut s);
        assert!(s.scanned.is_none());
    }

    #[test]
    fn test_pending_requires_open_report() {
        let s = session(ChatState::AwaitingVendor);
        assert!(matches!(pending_of(&s), Err(ProtocolError::NoOpenReport)));
    }

    #[test]
    fn test_extension_prefers_filename() {
        assert_eq!(extension_of(&upload(Some("IMG_1.JPG"), "image/jpeg"), "image/jpeg"), "jpg");
        assert_eq!(extension_of(&upload(None, "image/png"), "image/png"), "png");
        assert_eq!(extension_of(&upload(Some("noext"), "x/unknown"), "x/unknown"), "bin");
    }

    #[test]
    fn test_content_type_guessed_from_name() {
        assert_eq!(content_type_of(&upload(Some("r.png"), "")), "image/png");
        assert_eq!(content_type_of(&upload(None, "")), "application/octet-stream");
        assert_eq!(content_type_of(&upload(None, "image/webp")), "image/webp");
    }

    #[test]
    fn test_outbound_serialization() {
        let json = serde_json::to_value(Outbound::text("hi")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
        let json = serde_json::to_value(Outbound::ResetForm).unwrap();
        assert_eq!(json["type"], "reset_form");
    }
}
