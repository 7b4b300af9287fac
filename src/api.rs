use crate::models::Model;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BACKEND_URL: &str = "https://space.ai-builders.com/backend/v1";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1024;

/// Reply from the hosted completion backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub content: Option<String>,
    pub usage: Option<serde_json::Value>,
}

// Trait defining the interface for the upstream LLM API.
// Messages are passed through as the caller sent them, extra fields included.
#[async_trait]
pub trait LLMApiProvider: Send + Sync {
    async fn send_chat_request(&self, model: Model, messages: &[Value]) -> Result<BackendReply>;
}

// --- OpenAI Compatible Provider Implementation ---

#[derive(Serialize, Debug)]
struct OpenAIRequestBody<'a> {
    model: &'a str,
    messages: &'a [Value],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct OpenAIChoice {
    message: Option<OpenAIResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

// Error bodies look like {"error": {"message": "..."}}
#[derive(Deserialize, Debug)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize, Debug)]
struct OpenAIErrorDetail {
    message: String,
}

pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn request_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LLMApiProvider for OpenAICompatibleProvider {
    async fn send_chat_request(&self, model: Model, messages: &[Value]) -> Result<BackendReply> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(anyhow::anyhow!("Backend credential is not configured"));
        };

        let request_url = self.request_url();
        log::info!(
            "Sending request to OpenAI compatible API: {} using model: {} ({} messages)",
            request_url,
            model,
            messages.len()
        );

        let request_body = OpenAIRequestBody {
            model: model.id(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let response = self.client
            .post(&request_url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to completion backend")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_else(|_| "<Failed to read error body>".to_string());
            log::error!("Completion backend request failed with status {}: {}", status, error_body);
            return Err(match serde_json::from_str::<OpenAIErrorBody>(&error_body) {
                Ok(parsed) => anyhow::anyhow!(parsed.error.message),
                Err(_) => anyhow::anyhow!("API request failed with status {}: {}", status, error_body),
            });
        }

        let parsed: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse completion backend response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);

        log::debug!("Completion backend replied ({} chars)", content.as_deref().map_or(0, str::len));
        Ok(BackendReply {
            content,
            usage: parsed.usage,
        })
    }
}
