//! Outbound delivery to chat connections.
//!
//! Each connection has its own outbox. System-wide notices go through a
//! separate broadcast channel and never carry session data.

pub mod outbox;

pub use outbox::{ChatHub, Notice};
