use crate::classifier::{Classification, ExtractedFields};

/// State threaded through the scan steps.
pub struct ScanContext {
    // Input
    pub upload: Vec<u8>,

    // Step 1 result, normalized PNG
    pub preprocessed: Option<Vec<u8>>,

    // Step 2 result, full page text or "not found"
    pub raw_text: Option<String>,

    // Step 3 result
    pub classification: Option<Classification>,

    // Step 4 result
    pub fields: Option<ExtractedFields>,
}

impl ScanContext {
    pub fn new(upload: Vec<u8>) -> Self {
        Self {
            upload,
            preprocessed: None,
            raw_text: None,
            classification: None,
            fields: None,
        }
    }
}
