use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::Principal;
use crate::backend::RecordHandle;
use crate::report::{DigitizedForm, PendingExpense};

use super::state::ChatState;

/// Opaque identity of one chat connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The expense record a connection is currently filling in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub err_id: String,
    pub record: RecordHandle,
}

/// Conversation state of a single connection.
#[derive(Debug, Clone)]
pub struct Session {
    id: ConnectionId,
    principal: Principal,
    pub state: ChatState,
    pub report: Option<ReportContext>,
    pub pending: Option<PendingExpense>,
    /// The last scanned form, held until the user confirms it.
    pub scanned: Option<DigitizedForm>,
}

impl Session {
    pub fn new(id: ConnectionId, principal: Principal) -> Self {
        Self {
            id,
            principal,
            state: ChatState::Unstarted,
            report: None,
            pending: None,
            scanned: None,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Drops report, expense and scan data and returns to the menu.
    pub fn reset(&mut self) {
        self.state = ChatState::Initial;
        self.report = None;
        self.pending = None;
        self.scanned = None;
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// All live sessions, one per connection.
///
/// The map lock is only held to look up, insert or remove an entry. A turn
/// holds the mutex of its own session and nothing else.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ConnectionId, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, SharedSession>> {
        match self.sessions.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Session store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, SharedSession>> {
        match self.sessions.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Session store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Registers a fresh session, replacing any previous one for the same
    /// connection.
    pub fn open(&self, id: ConnectionId, principal: Principal) -> SharedSession {
        let session = Arc::new(Mutex::new(Session::new(id.clone(), principal)));
        self.write().insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &ConnectionId) -> Option<SharedSession> {
        self.read().get(id).cloned()
    }

    pub fn remove(&self, id: &ConnectionId) -> bool {
        self.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
