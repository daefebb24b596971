pub mod image;
pub mod ocr;
pub mod tesseract;
pub mod vision;

use std::sync::Arc;

pub use self::image::ImagePreprocessor;
pub use ocr::TextExtractor;
pub use tesseract::TesseractOcrProvider;
pub use vision::VisionOcrProvider;

use crate::backend::OcrProvider;
use crate::config::{OcrConfig, OcrProviderKind};
use crate::error::ProviderError;

/// Builds the OCR provider selected in the config.
pub fn ocr_provider_from_config(
    config: &OcrConfig,
) -> Result<Arc<dyn OcrProvider>, ProviderError> {
    match config.provider {
        OcrProviderKind::Vision => Ok(Arc::new(VisionOcrProvider::from_config(config)?)),
        OcrProviderKind::Tesseract => Ok(Arc::new(TesseractOcrProvider::new(&config.languages))),
    }
}
