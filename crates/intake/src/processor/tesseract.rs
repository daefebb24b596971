//! Local OCR through Tesseract.
//!
//! Linking leptonica/tesseract is opt-in via the `tesseract` feature. Without
//! it the provider still exists but every call reports it as unconfigured.

use async_trait::async_trait;

use crate::backend::{OcrProvider, TextAnnotation};
use crate::error::ProviderError;

pub struct TesseractOcrProvider {
    languages: String,
}

impl TesseractOcrProvider {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };
        Self { languages }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

#[cfg(feature = "tesseract")]
fn recognize(languages: &str, image: &[u8]) -> Result<String, ProviderError> {
    let mut lt = leptess::LepTess::new(None, languages)
        .map_err(|e| ProviderError::Ocr(format!("Failed to initialize Tesseract: {}", e)))?;
    lt.set_image_from_mem(image)
        .map_err(|e| ProviderError::Ocr(format!("Failed to set image for OCR: {}", e)))?;
    lt.get_utf8_text()
        .map_err(|e| ProviderError::Ocr(format!("OCR failed: {}", e)))
}

#[cfg(not(feature = "tesseract"))]
fn recognize(_languages: &str, _image: &[u8]) -> Result<String, ProviderError> {
    Err(ProviderError::NotConfigured(
        "built without the `tesseract` feature".to_string(),
    ))
}

#[async_trait]
impl OcrProvider for TesseractOcrProvider {
    async fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>, ProviderError> {
        let languages = self.languages.clone();
        let image = image.to_vec();
        let text = tokio::task::spawn_blocking(move || recognize(&languages, &image))
            .await
            .map_err(|e| ProviderError::Ocr(format!("OCR task failed: {}", e)))??;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TextAnnotation::new(text)])
    }
}
