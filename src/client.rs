use crate::error::CompletionError;
use crate::models::{ChatMessage, Message, Model};
use crate::title::build_title_prompt;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// The assistant's reply to one completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub message: String,
    pub usage: Option<serde_json::Value>,
}

/// Request/response access to the chat-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, model: Model, messages: &[ChatMessage]) -> Result<Completion, CompletionError>;

    /// Asks for a short label summarizing `messages`; returns the raw reply.
    async fn summarize(&self, model: Model, messages: &[Message]) -> Result<String, CompletionError> {
        let prompt = vec![ChatMessage::new("user", build_title_prompt(messages))];
        self.complete(model, &prompt).await.map(|c| c.message)
    }
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    model: Model,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    message: String,
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ProxyErrorResponse {
    error: Option<String>,
}

/// Talks to the `/api/chat` route served by [`crate::routes`].
pub struct ProxyClient {
    client: Client,
    endpoint: String,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for ProxyClient {
    async fn complete(&self, model: Model, messages: &[ChatMessage]) -> Result<Completion, CompletionError> {
        log::debug!("POST {} model={} messages={}", self.endpoint, model, messages.len());
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ProxyRequest { model, messages })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProxyErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| status.to_string());
            log::error!("Chat proxy returned {}: {}", status, message);
            return Err(CompletionError::RequestFailed(message));
        }

        let parsed: ProxyResponse = response.json().await?;
        Ok(Completion {
            message: parsed.message,
            usage: parsed.usage,
        })
    }
}
