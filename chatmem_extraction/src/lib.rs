//! # chatmem Extraction
//!
//! LLM enrichment of linearized conversations.
//!
//! This crate provides:
//! - **Per-turn summaries**: every assistant reply is summarized with the
//!   preceding turns of the same conversation as context ([`pipeline::EnrichmentPipeline::process`])
//! - **Memory extraction**: one call per conversation producing a bulleted
//!   list of long-term user facts ([`pipeline::EnrichmentPipeline::extract_memories`])
//! - **Batch runs** that skip failing conversations and report counts
//!   ([`pipeline::EnrichmentPipeline::run_batch`])
//! - The fixed prompt texts ([`prompts`])
//!
//! The model itself sits behind [`CompletionBackend`]; the HTTP client lives
//! in `chatmem_server::llm`. Tests drive the pipeline with scripted mocks.

pub mod pipeline;
pub mod prompts;

pub use pipeline::{
    BatchMetrics, BatchReport, ConversationFailure, EnrichmentConfig, EnrichmentPipeline,
};
pub use prompts::{prompt_set, MEMORY_EXTRACTION_PROMPT, SUMMARIZATION_PROMPT};

/// Single-prompt text completion.
///
/// Implementors send `prompt` as one user-role message to `model` and return
/// the text of the first choice.
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> anyhow::Result<String>;
}
