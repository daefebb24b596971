use std::sync::Arc;

use crate::backend::OcrProvider;
use crate::error::ProviderError;
use crate::report::NOT_FOUND;
use crate::sanitize::preview_text;

/// Turns a preprocessed image into the full text of the page.
#[derive(Clone)]
pub struct TextExtractor {
    provider: Arc<dyn OcrProvider>,
}

impl TextExtractor {
    pub fn new(provider: Arc<dyn OcrProvider>) -> Self {
        Self { provider }
    }

    /// Returns the first annotation's text, trimmed, or `"not found"` when
    /// the provider saw nothing. Provider failures are returned as errors.
    pub async fn extract(&self, image: &[u8]) -> Result<String, ProviderError> {
        let annotations = self.provider.detect_text(image).await?;

        let text = annotations
            .first()
            .map(|a| a.description.trim())
            .filter(|t| !t.is_empty());

        match text {
            Some(text) => {
                log::debug!(
                    "OCR returned {} annotations, full text: {}",
                    annotations.len(),
                    preview_text(text)
                );
                Ok(text.to_string())
            }
            None => {
                log::info!("OCR found no text in image");
                Ok(NOT_FOUND.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextAnnotation;
    use async_trait::async_trait;

    struct FixedProvider(Result<Vec<TextAnnotation>, String>);

    #[async_trait]
    impl OcrProvider for FixedProvider {
        async fn detect_text(&self, _image: &[u8]) -> Result<Vec<TextAnnotation>, ProviderError> {
            self.0.clone().map_err(ProviderError::Ocr)
        }
    }

    fn extractor(result: Result<Vec<TextAnnotation>, String>) -> TextExtractor {
        TextExtractor::new(Arc::new(FixedProvider(result)))
    }

    #[tokio::test]
    async fn test_returns_first_annotation_trimmed() {
        let ex = extractor(Ok(vec![
            TextAnnotation::new("  Date: 2024-03-01\nERR 12  \n"),
            TextAnnotation::new("Date:"),
        ]));
        assert_eq!(ex.extract(b"png").await.unwrap(), "Date: 2024-03-01\nERR 12");
    }

    #[tokio::test]
    async fn test_no_annotations_is_not_found() {
        let ex = extractor(Ok(vec![]));
        assert_eq!(ex.extract(b"png").await.unwrap(), NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_annotation_is_not_found() {
        let ex = extractor(Ok(vec![TextAnnotation::new("   \n")]));
        assert_eq!(ex.extract(b"png").await.unwrap(), NOT_FOUND);
    }

    #[tokio::test]
    async fn test_provider_error_surfaces() {
        let ex = extractor(Err("quota exceeded".to_string()));
        assert!(matches!(
            ex.extract(b"png").await,
            Err(ProviderError::Ocr(_))
        ));
    }
}
