//! Shared test utilities for intake integration tests.
//!
//! This module provides:
//! - `TestHarness`, a chat service over in-memory SQLite and temp storage
//! - scripted OCR and text-generation providers plus input builders

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{texts, HarnessOptions, TestHarness, FILES_URL};
