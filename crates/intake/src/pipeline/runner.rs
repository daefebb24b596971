use std::sync::Arc;
use std::time::Duration;

use tracing::{info_span, Instrument};

use crate::classifier::{extract_fields, Classification, FieldClassifier};
use crate::error::ProcessError;
use crate::processor::{ImagePreprocessor, TextExtractor};
use crate::report::{DigitizedForm, NOT_FOUND};
use crate::sanitize::preview_text;

use super::context::ScanContext;
use super::error::ScanError;

/// Digitizes a photographed paper form.
///
/// The whole run is bounded by a timeout. When it elapses the in-flight step
/// is dropped, which cancels any outstanding provider request.
#[derive(Clone)]
pub struct ScanPipeline {
    preprocessor: ImagePreprocessor,
    extractor: TextExtractor,
    classifier: Arc<dyn FieldClassifier>,
    timeout: Duration,
}

impl ScanPipeline {
    pub fn new(
        preprocessor: ImagePreprocessor,
        extractor: TextExtractor,
        classifier: Arc<dyn FieldClassifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            preprocessor,
            extractor,
            classifier,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(&self, upload: Vec<u8>) -> Result<DigitizedForm, ScanError> {
        let size = upload.len();
        let ctx = ScanContext::new(upload);

        let outcome = tokio::time::timeout(self.timeout, self.run_steps(ctx))
            .instrument(info_span!("scan", bytes = size))
            .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Scan cancelled after {}s", self.timeout.as_secs());
                Err(ScanError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    async fn run_steps(&self, mut ctx: ScanContext) -> Result<DigitizedForm, ScanError> {
        // Step 1: Preprocess
        self.step_preprocess(&mut ctx)
            .instrument(info_span!("scan.preprocess"))
            .await?;

        // Step 2: OCR
        self.step_ocr(&mut ctx)
            .instrument(info_span!("scan.ocr"))
            .await?;

        // Step 3: Classify
        self.step_classify(&mut ctx)
            .instrument(info_span!("scan.classify"))
            .await;

        // Step 4: Field extraction
        self.step_extract_fields(&mut ctx);

        Ok(Self::into_form(ctx))
    }

    async fn step_preprocess(&self, ctx: &mut ScanContext) -> Result<(), ScanError> {
        let preprocessor = self.preprocessor;
        let upload = std::mem::take(&mut ctx.upload);
        let png = tokio::task::spawn_blocking(move || preprocessor.process(&upload))
            .await
            .map_err(|e| ProcessError::Task(e.to_string()))??;
        ctx.preprocessed = Some(png);
        Ok(())
    }

    async fn step_ocr(&self, ctx: &mut ScanContext) -> Result<(), ScanError> {
        let image = ctx.preprocessed.as_deref().unwrap_or_default();
        let text = self.extractor.extract(image).await?;
        log::debug!("OCR text: {}", preview_text(&text));
        ctx.raw_text = Some(text);
        Ok(())
    }

    async fn step_classify(&self, ctx: &mut ScanContext) {
        let raw_text = ctx.raw_text.as_deref().unwrap_or(NOT_FOUND);
        if raw_text == NOT_FOUND {
            ctx.classification = Some(Classification::default());
            return;
        }
        ctx.classification = Some(self.classifier.classify(raw_text).await);
    }

    fn step_extract_fields(&self, ctx: &mut ScanContext) {
        let Some(classification) = ctx.classification.as_ref() else {
            return;
        };
        let mut fields = extract_fields(&classification.text);
        if let Some(row) = classification.rows.first() {
            fields.merge_row(row);
        }
        // The table strategy only renders rows, so the page header stays in the OCR text.
        if fields.date.is_none() || fields.report_identifier.is_none() {
            if let Some(raw_text) = ctx.raw_text.as_deref() {
                let page = extract_fields(raw_text);
                fields.date = fields.date.or(page.date);
                fields.report_identifier = fields.report_identifier.or(page.report_identifier);
            }
        }
        ctx.fields = Some(fields);
    }

    fn into_form(ctx: ScanContext) -> DigitizedForm {
        let raw_text = ctx.raw_text.unwrap_or_else(|| NOT_FOUND.to_string());
        let narrative = ctx.classification.map(|c| c.text).unwrap_or_default();
        match ctx.fields {
            Some(fields) => fields.to_digitized(&raw_text, &narrative),
            None => DigitizedForm {
                raw_text,
                narrative,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{OcrProvider, TextAnnotation};
    use crate::classifier::TableClassifier;
    use crate::config::PreprocessPolicy;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrProvider for FixedOcr {
        async fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>, ProviderError> {
            // The provider must receive the preprocessed PNG.
            assert!(image::guess_format(image).map(|f| f == ImageFormat::Png).unwrap_or(false));
            if self.0.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![TextAnnotation::new(self.0)])
        }
    }

    struct StalledOcr;

    #[async_trait]
    impl OcrProvider for StalledOcr {
        async fn detect_text(&self, _image: &[u8]) -> Result<Vec<TextAnnotation>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn sample_jpeg() -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 16, Rgb([240, 240, 240]));
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Jpeg)
            .unwrap();
        data
    }

    fn pipeline(ocr: Arc<dyn OcrProvider>, timeout: Duration) -> ScanPipeline {
        ScanPipeline::new(
            ImagePreprocessor::new(PreprocessPolicy::SmoothContrast),
            TextExtractor::new(ocr),
            Arc::new(TableClassifier::new()),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_table_scan_fills_form() {
        let text = "Date: 2024-03-01\nERR Number: KH-0042\nActivity Description Date Seller Method Receipt Expenses\nFood 1\nRice 2\n02/03\nSouq 4\nCash 5\n1187\n300";
        let form = pipeline(Arc::new(FixedOcr(text)), Duration::from_secs(5))
            .run(sample_jpeg())
            .await
            .unwrap();
        assert_eq!(form.date, "2024-03-01");
        assert_eq!(form.report_identifier, "KH-0042");
        assert_eq!(form.activity, "Food 1");
        assert_eq!(form.receipt_no, "1187");
        assert_eq!(form.amount, "300");
        assert_eq!(form.raw_text, text);
        assert!(form.narrative.contains("- Activity: Food 1"));
    }

    #[tokio::test]
    async fn test_no_text_found() {
        let form = pipeline(Arc::new(FixedOcr("")), Duration::from_secs(5))
            .run(sample_jpeg())
            .await
            .unwrap();
        assert_eq!(form.raw_text, NOT_FOUND);
        assert_eq!(form.activity, NOT_FOUND);
    }

    #[tokio::test]
    async fn test_undecodable_upload() {
        let result = pipeline(Arc::new(FixedOcr("x")), Duration::from_secs(5))
            .run(b"not an image".to_vec())
            .await;
        assert!(matches!(result, Err(ScanError::Preprocess(_))));
    }

    #[tokio::test]
    async fn test_timeout_cancels_scan() {
        let result = pipeline(Arc::new(StalledOcr), Duration::from_millis(200))
            .run(sample_jpeg())
            .await;
        assert!(matches!(result, Err(ScanError::Timeout { .. })));
    }
}
