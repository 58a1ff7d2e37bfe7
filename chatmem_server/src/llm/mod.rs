//! Completion backend selection.
//!
//! The model name decides where requests go: local model servers use tags
//! like `llama3.1:8b`, so any name containing `:` or starting with a known
//! local family prefix is sent to the local endpoint with a placeholder key.
//! Everything else goes to OpenAI with the key from the environment.

pub mod client;

use std::fmt;
use std::time::Duration;

use chatmem_config::LlmConfig;
use tracing::info;

pub use client::{ChatMessage, LlmError, OpenAIClient};

/// Placeholder key local servers require but ignore.
pub const LOCAL_API_KEY: &str = "ollama";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMode {
    Local,
    OpenAi,
}

impl LlmMode {
    pub fn detect(model: &str, local_prefixes: &[String]) -> Self {
        if model.contains(':') || local_prefixes.iter().any(|p| model.starts_with(p.as_str())) {
            LlmMode::Local
        } else {
            LlmMode::OpenAi
        }
    }

    /// Value recorded as `llm_mode` in output metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            LlmMode::Local => "local",
            LlmMode::OpenAi => "openai",
        }
    }
}

impl fmt::Display for LlmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ready client together with the model and mode it was built for.
pub struct LlmSetup {
    pub client: OpenAIClient,
    pub model: String,
    pub mode: LlmMode,
}

/// Build the client for `model`.
///
/// OpenAI mode fails with [`LlmError::MissingApiKey`] when the configured key
/// variable is unset or empty.
pub fn setup_llm_client(model: &str, config: &LlmConfig) -> Result<LlmSetup, LlmError> {
    let mode = LlmMode::detect(model, &config.local_model_prefixes);
    let timeout = match config.request_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let client = match mode {
        LlmMode::Local => {
            info!("Using local Ollama model: {}", model);
            OpenAIClient::new(LOCAL_API_KEY, config.local_base_url.as_str(), timeout)?
        }
        LlmMode::OpenAi => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
            info!("Using OpenAI model: {}", model);
            OpenAIClient::new(api_key, config.openai_base_url.as_str(), timeout)?
        }
    };

    Ok(LlmSetup {
        client,
        model: model.to_string(),
        mode,
    })
}
