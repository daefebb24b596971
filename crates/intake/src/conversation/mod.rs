//! The per-connection chat state machine.
//!
//! A connection moves through a menu, the ERR ID lookup, a per-expense loop
//! and the structured-form and scan flows. Each turn is computed from a
//! snapshot of the session and committed only once it has completed.

pub mod engine;
pub mod forms;
pub mod messages;
pub mod session;
pub mod state;

pub use engine::{
    Backends, ConversationEngine, Inbound, Outbound, SessionUpdate, Transition, Upload,
};
pub use forms::{EntryBlock, FieldKind, FormField, MultiEntryForm, PrefilledExpense, PrefilledForm};
pub use session::{ConnectionId, ReportContext, Session, SessionStore, SharedSession};
pub use state::ChatState;
