//! Google Cloud Vision `images:annotate` client.

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::backend::{OcrProvider, TextAnnotation};
use crate::config::OcrConfig;
use crate::error::ProviderError;

/// Keeps the key out of the request URL, which reqwest errors echo.
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct VisionOcrProvider {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl VisionOcrProvider {
    pub fn new(
        endpoint: String,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn from_config(config: &OcrConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .resolve()
            .map_err(|e| ProviderError::NotConfigured(format!("Vision API key: {}", e)))?;
        Self::new(
            config.endpoint.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default, rename = "textAnnotations")]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<VisionStatus>,
}

#[derive(Deserialize)]
struct VisionStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

fn build_request(image: &[u8]) -> AnnotateRequest {
    AnnotateRequest {
        requests: vec![ImageRequest {
            image: ImageContent {
                content: BASE64_STANDARD.encode(image),
            },
            features: vec![Feature {
                kind: "TEXT_DETECTION",
            }],
        }],
    }
}

fn into_annotations(response: AnnotateResponse) -> Result<Vec<TextAnnotation>, ProviderError> {
    let Some(first) = response.responses.into_iter().next() else {
        return Ok(Vec::new());
    };
    if let Some(status) = first.error {
        return Err(ProviderError::Ocr(format!(
            "Vision error {}: {}",
            status.code, status.message
        )));
    }
    Ok(first.text_annotations)
}

#[async_trait]
impl OcrProvider for VisionOcrProvider {
    async fn detect_text(&self, image: &[u8]) -> Result<Vec<TextAnnotation>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&build_request(image))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Ocr(format!(
                "Vision returned {}: {}",
                status, body
            )));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::Ocr(format!("Failed to parse Vision response: {}", e.without_url()))
            })?;

        into_annotations(parsed)
    }
}
