//! The scan flow: preprocess, OCR, classify, extract fields.

pub mod context;
pub mod error;
pub mod runner;

pub use context::ScanContext;
pub use error::ScanError;
pub use runner::ScanPipeline;
