//! OpenAI chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::backend::TextGenerator;
use crate::config::GenerationConfig;
use crate::error::ProviderError;

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiGenerator {
    pub fn new(
        endpoint: String,
        model: String,
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
            model,
            api_key,
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .resolve()
            .map_err(|e| ProviderError::NotConfigured(format!("OpenAI API key: {}", e)))?;
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &str, max_tokens: u32, temperature: f32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            max_tokens,
            temperature,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text(response: ChatResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ProviderError::Generation("response contained no message".to_string()))
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        log::debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.build_request(prompt, max_tokens, temperature))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ProviderError::Generation(format!(
                "OpenAI returned {}: {}",
                status, message
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::Generation(format!("Failed to parse OpenAI response: {}", e))
        })?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> OpenAiGenerator {
        OpenAiGenerator::new(
            "http://localhost:9/v1/chat/completions".to_string(),
            "gpt-3.5-turbo".to_string(),
            SecretString::from("sk-test"),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(generator().build_request("hello", 1000, 0.7)).unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_extract_text() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  Date: 2024-03-01 \n"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Date: 2024-03-01");
    }

    #[test]
    fn test_extract_text_empty_choices() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            extract_text(parsed),
            Err(ProviderError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let result = generator().complete("hi", 10, 0.0).await;
        assert!(result.is_err());
    }
}
