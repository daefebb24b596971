use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::error::ProcessError),

    #[error("Text extraction failed: {0}")]
    Extraction(#[from] crate::error::ProviderError),

    #[error("Scan did not finish within {secs}s")]
    Timeout { secs: u64 },
}
