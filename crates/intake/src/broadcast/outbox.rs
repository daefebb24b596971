use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::conversation::{ConnectionId, Outbound};

/// A message for every connected client, e.g. maintenance announcements.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Notice {
    pub fn new(message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.to_string(),
        }
    }
}

type Outboxes = HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>;

#[derive(Clone)]
pub struct ChatHub {
    outboxes: Arc<RwLock<Outboxes>>,
    notices: broadcast::Sender<Notice>,
}

impl ChatHub {
    pub fn new(notice_capacity: usize) -> Self {
        let (notices, _) = broadcast::channel(notice_capacity);
        Self {
            outboxes: Arc::new(RwLock::new(HashMap::new())),
            notices,
        }
    }

    fn outboxes_mut(&self) -> RwLockWriteGuard<'_, Outboxes> {
        match self.outboxes.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Chat hub lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Opens the outbox of a connection. A second registration replaces the
    /// first, whose receiver then sees the channel closed.
    pub fn register(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes_mut().insert(id, tx);
        rx
    }

    pub fn unregister(&self, id: &ConnectionId) {
        self.outboxes_mut().remove(id);
    }

    /// Delivers messages to one connection only. Returns how many were
    /// queued; a closed outbox is dropped.
    pub fn send(&self, id: &ConnectionId, messages: Vec<Outbound>) -> usize {
        let sender = match self.outboxes.read() {
            Ok(g) => g.get(id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(id).cloned(),
        };
        let Some(sender) = sender else {
            log::debug!("No outbox for connection, dropping {} messages", messages.len());
            return 0;
        };

        let mut delivered = 0;
        for message in messages {
            if sender.send(message).is_err() {
                self.unregister(id);
                break;
            }
            delivered += 1;
        }
        delivered
    }

    /// Sends a notice to every subscriber.
    pub fn announce(&self, message: &str) {
        // No subscribers is fine.
        let _ = self.notices.send(Notice::new(message));
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        match self.outboxes.read() {
            Ok(g) => g.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new(64)
    }
}
