//! Scripted providers and input builders.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};

use intake::backend::{OcrProvider, TextAnnotation, TextGenerator};
use intake::ProviderError;

/// OCR provider that returns a fixed full-text annotation.
pub struct ScriptedOcr {
    result: Result<String, String>,
    delay: Option<Duration>,
}

impl ScriptedOcr {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            delay: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            delay: None,
        }
    }

    /// Waits before answering, to exercise the scan timeout.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl OcrProvider for ScriptedOcr {
    async fn detect_text(&self, _image: &[u8]) -> Result<Vec<TextAnnotation>, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.result {
            Ok(text) if text.is_empty() => Ok(vec![]),
            Ok(text) => Ok(vec![TextAnnotation::new(text.clone())]),
            Err(reason) => Err(ProviderError::Ocr(reason.clone())),
        }
    }
}

/// Text generator that answers every prompt the same way and records prompts.
pub struct ScriptedGenerator {
    answer: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        self.answer.clone().map_err(ProviderError::Generation)
    }
}

/// A small PNG photo stand-in.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbImage::new(width, height);
    for (x, y, p) in img.enumerate_pixels_mut() {
        let v = if (x / 4 + y / 4) % 2 == 0 { 40 } else { 210 };
        *p = Rgb([v, v, v]);
    }
    let mut data = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .expect("encode fixture");
    data
}

/// OCR text of a photographed report page with one table row.
pub const TABLE_PAGE: &str = "Date: 2024-03-01\nERR Number: ERR999\nActivity Description Payment Date Seller Method Receipt Expenses\nFood 1\nRice bags 2\n2024-02-28\nMarket 4\nCash 5\nR-0016\n45.00";

/// A language-model answer in the labelled format.
pub const LABELLED_ANSWER: &str = "Date: 2024-03-01\nERR Number: ERR999\n\n- Activity: Food distribution\n- Description: Rice bags\n- Payment Date: 2024-02-28\n- Seller/Recipient: Central Market\n- Payment Method: Cash\n- Receipt No.: R-0016\n- Expenses: 45.00\n\nHow did you cover excess expenses? Community donations.";

/// Builder for the structured form payload.
pub struct FormBuilder {
    payload: Value,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self {
            payload: json!({
                "date": "2024-03-01",
                "total-grant": "500",
                "total-other-sources": "50",
                "additional-excess-expenses": "Community support",
                "additional-surplus-use": "Next month's kitchen",
                "additional-budget-lessons": "Buy in bulk",
                "additional-training-needs": "Bookkeeping",
                "expenses": [],
                "uploaded_urls": [],
            }),
        }
    }

    pub fn err_id(mut self, err_id: &str) -> Self {
        self.payload["err_id"] = json!(err_id);
        self
    }

    pub fn expense(mut self, activity: &str, amount: &str) -> Self {
        if let Some(rows) = self.payload["expenses"].as_array_mut() {
            rows.push(json!({
                "activity": activity,
                "description": format!("{activity} supplies"),
                "payment-date": "2024-02-28",
                "seller": "Central Market",
                "payment-method": "cash",
                "receipt-no": "R-1",
                "amount": amount,
            }));
        }
        self
    }

    /// Sends the expenses as a JSON-encoded string instead of an array.
    pub fn encoded_expenses(mut self) -> Self {
        let encoded = self.payload["expenses"].to_string();
        self.payload["expenses"] = json!(encoded);
        self
    }

    pub fn uploaded(mut self, url: &str) -> Self {
        if let Some(urls) = self.payload["uploaded_urls"].as_array_mut() {
            urls.push(json!(url));
        }
        self
    }

    pub fn build(self) -> Value {
        self.payload
    }
}

impl Default for FormBuilder {
    fn default() -> Self {
        Self::new()
    }
}
