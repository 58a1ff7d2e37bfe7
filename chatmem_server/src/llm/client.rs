//! OpenAI-compatible chat completions client.
//!
//! Talks to `{base_url}/chat/completions`, which covers both the hosted
//! OpenAI API and local servers exposing the same surface (Ollama).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chatmem_extraction::CompletionBackend;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse completion response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No completion choices returned")]
    EmptyResponse,
    #[error("API key not found: set the {0} environment variable")]
    MissingApiKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageContent,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageContent {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAIClient {
    api_key: String,
    api_base_url: String,
    client: Client,
}

impl OpenAIClient {
    /// `timeout` bounds each whole request; `None` waits indefinitely.
    pub fn new(
        api_key: impl Into<String>,
        api_base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            api_key: api_key.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Send `messages` to `model` and return the first choice's text.
    ///
    /// A choice whose content is `null` yields an empty string.
    pub async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.api_base_url);
        debug!(model, url = url.as_str(), "Sending chat completion");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&OpenAIChatRequest { model, messages })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let chat_response: OpenAIChatResponse = serde_json::from_str(&body)?;
        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        Ok(choice.message.content.unwrap_or_else(|| {
            warn!(model, "Completion returned null content");
            String::new()
        }))
    }
}

#[async_trait]
impl CompletionBackend for OpenAIClient {
    async fn complete(&self, model: &str, prompt: &str) -> anyhow::Result<String> {
        Ok(self.chat(model, &[ChatMessage::user(prompt)]).await?)
    }
}
