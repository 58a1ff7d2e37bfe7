//! Enrichment pipeline: raw conversation in, summarized turns and memories out.
//!
//! 1. **Linearize** the visible path of the conversation
//! 2. **Summarize** each assistant reply with the turns before it as context
//! 3. **Extract memories** from the whole processed conversation (optional)
//!
//! Calls are issued strictly one at a time. A backend failure aborts only the
//! conversation it happened in; [`EnrichmentPipeline::run_batch`] records it
//! and moves on.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, info_span, warn, Instrument};

use chatmem_core::{flatten_all, linearize, ProcessedConversation, RawConversation, Role, Turn};

use crate::prompts::{memory_extraction_prompt, summarization_prompt};
use crate::CompletionBackend;

/// Characters of a turn shown in debug previews.
const PREVIEW_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for an enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Model name passed through to the backend on every call.
    pub model: String,
    /// Whether to run memory extraction after summarization.
    pub extract_memories: bool,
}

impl EnrichmentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            extract_memories: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counts and timings for one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchMetrics {
    /// Conversations handed to the batch.
    pub total: usize,
    /// Conversations enriched successfully.
    pub processed: usize,
    /// Conversations skipped after a backend error.
    pub failed: usize,
    /// Assistant turns summarized across successful conversations.
    pub summaries_generated: usize,
    /// Memory extraction calls that succeeded.
    pub memories_extracted: usize,
    /// Total batch duration in microseconds.
    pub total_us: u64,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A conversation that was skipped.
#[derive(Debug, Clone)]
pub struct ConversationFailure {
    pub id: String,
    pub title: String,
    pub error: String,
}

/// Outcome of [`EnrichmentPipeline::run_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successfully enriched conversations, in input order.
    pub conversations: Vec<ProcessedConversation>,
    pub failures: Vec<ConversationFailure>,
    pub metrics: BatchMetrics,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Drives a [`CompletionBackend`] over conversations.
pub struct EnrichmentPipeline<'a> {
    backend: &'a dyn CompletionBackend,
    config: EnrichmentConfig,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, config: EnrichmentConfig) -> Self {
        Self { backend, config }
    }

    /// Linearize `raw` and summarize every assistant reply.
    ///
    /// User messages become user turns verbatim. System, tool and unknown
    /// roles are dropped. The context of each summary is the flattened list
    /// of turns built so far, so it only ever sees earlier turns of this
    /// conversation.
    pub async fn process(&self, raw: &RawConversation) -> Result<ProcessedConversation> {
        let mut processed = ProcessedConversation::from_raw(raw);

        for message in linearize(raw) {
            match message.role {
                Role::User => {
                    debug!("[USER] {}...", preview(&message.text));
                    processed.turns.push(Turn::user(message.text));
                }
                Role::Assistant => {
                    let context = flatten_all(&processed.turns);
                    let prompt = summarization_prompt(&context, &message.text);
                    let summary = self
                        .backend
                        .complete(&self.config.model, &prompt)
                        .await
                        .with_context(|| {
                            format!(
                                "Summarizing assistant turn {} failed",
                                processed.turns.len()
                            )
                        })?;
                    debug!("[ASSISTANT SUMMARY] {}...", preview(&summary));
                    processed.turns.push(Turn::assistant(message.text, summary));
                }
                _ => continue,
            }
        }

        Ok(processed)
    }

    /// One completion over the whole flattened conversation. The model's
    /// output is returned as-is.
    pub async fn extract_memories(&self, processed: &ProcessedConversation) -> Result<String> {
        let prompt = memory_extraction_prompt(&flatten_all(&processed.turns));
        self.backend
            .complete(&self.config.model, &prompt)
            .await
            .context("Memory extraction failed")
    }

    /// [`process`](Self::process), then attach memories when enabled.
    pub async fn enrich(&self, raw: &RawConversation) -> Result<ProcessedConversation> {
        let mut processed = self.process(raw).await?;
        if self.config.extract_memories {
            debug!("Extracting memories...");
            processed.memories = Some(self.extract_memories(&processed).await?);
        }
        Ok(processed)
    }

    /// Enrich `conversations` one by one.
    ///
    /// A failing conversation is logged with its id and title and left out of
    /// the report's conversations; the rest of the batch still runs.
    pub async fn run_batch(&self, conversations: &[RawConversation]) -> BatchReport {
        let batch_start = Instant::now();
        let total = conversations.len();
        let mut report = BatchReport {
            metrics: BatchMetrics {
                total,
                ..Default::default()
            },
            ..Default::default()
        };

        for (i, raw) in conversations.iter().enumerate() {
            let title = raw.display_title().to_string();
            info!("Processing {}/{}: {}", i + 1, total, title);

            let span = info_span!("chatmem.conversation", id = %raw.id, index = i + 1);
            match self.enrich(raw).instrument(span).await {
                Ok(processed) => {
                    report.metrics.processed += 1;
                    report.metrics.summaries_generated += processed
                        .turns
                        .iter()
                        .filter(|turn| !turn.is_user())
                        .count();
                    if processed.memories.is_some() {
                        report.metrics.memories_extracted += 1;
                    }
                    report.conversations.push(processed);
                }
                Err(e) => {
                    warn!(
                        "Error processing conversation {} ({}): {:#}",
                        raw.id, title, e
                    );
                    report.metrics.failed += 1;
                    report.failures.push(ConversationFailure {
                        id: raw.id.clone(),
                        title,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        report.metrics.total_us = batch_start.elapsed().as_micros() as u64;
        info!(
            "Successfully processed {}/{} conversations",
            report.metrics.processed, total
        );
        report
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // ── Mock backends ──────────────────────────────────────────────────

    /// Records every prompt and answers with a numbered reply.
    #[derive(Default)]
    struct RecordingBackend {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete(&self, _model: &str, prompt: &str) -> Result<String> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("summary {}", prompts.len()))
        }
    }

    struct FailingBackend;

    #[async_trait::async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    fn chat(id: &str, turns: &[(&str, &str)]) -> RawConversation {
        let mut mapping = serde_json::Map::new();
        mapping.insert("root".into(), serde_json::json!({"message": null, "parent": null}));
        let mut parent = "root".to_string();
        for (i, (role, text)) in turns.iter().enumerate() {
            let node_id = format!("m{i}");
            mapping.insert(
                node_id.clone(),
                serde_json::json!({
                    "message": {
                        "author": {"role": role},
                        "content": {"parts": [text]},
                        "create_time": 1_700_000_000.0 + i as f64,
                    },
                    "parent": parent,
                }),
            );
            parent = node_id;
        }
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": format!("Conversation {id}"),
            "create_time": 1_700_000_000.0,
            "update_time": 1_700_000_100.0,
            "mapping": mapping,
            "current_node": parent,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_process_builds_alternating_turns() {
        let backend = RecordingBackend::default();
        let pipeline = EnrichmentPipeline::new(&backend, EnrichmentConfig::new("test-model"));
        let raw = chat(
            "c1",
            &[("user", "Hi"), ("assistant", "Hello!"), ("user", "Bye")],
        );

        let processed = pipeline.process(&raw).await.unwrap();
        assert_eq!(processed.id, "c1");
        assert_eq!(processed.create_time, Some(1_700_000_000.0));
        assert_eq!(
            processed.turns,
            vec![
                Turn::user("Hi"),
                Turn::assistant("Hello!", "summary 1"),
                Turn::user("Bye"),
            ]
        );
        assert!(processed.memories.is_none());
    }

    #[tokio::test]
    async fn test_summary_context_is_prefix_of_same_conversation() {
        let backend = RecordingBackend::default();
        let pipeline = EnrichmentPipeline::new(&backend, EnrichmentConfig::new("m"));
        let raw = chat(
            "c1",
            &[
                ("user", "Q1"),
                ("assistant", "A1"),
                ("user", "Q2"),
                ("assistant", "A2"),
            ],
        );
        pipeline.process(&raw).await.unwrap();

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].ends_with("summarise:\n[user]\nQ1\nassistant: A1"));
        assert!(prompts[1].ends_with(
            "summarise:\n[user]\nQ1\n\n[agent]\nsummary 1\n\n[user]\nQ2\nassistant: A2"
        ));
    }

    #[tokio::test]
    async fn test_system_and_tool_messages_are_not_turns() {
        let backend = RecordingBackend::default();
        let pipeline = EnrichmentPipeline::new(&backend, EnrichmentConfig::new("m"));
        let raw = chat(
            "c1",
            &[
                ("system", "You are helpful"),
                ("user", "Hi"),
                ("tool", "search results"),
                ("assistant", "Hello"),
            ],
        );
        let processed = pipeline.process(&raw).await.unwrap();
        assert_eq!(processed.turns.len(), 2);
        assert!(processed.turns[0].is_user());
        assert_eq!(processed.turns[1].text(), "Hello");
    }

    #[tokio::test]
    async fn test_enrich_attaches_memories() {
        let backend = RecordingBackend::default();
        let pipeline = EnrichmentPipeline::new(&backend, EnrichmentConfig::new("m"));
        let raw = chat("c1", &[("user", "I live in Lisbon"), ("assistant", "Nice!")]);

        let processed = pipeline.enrich(&raw).await.unwrap();
        assert_eq!(processed.memories.as_deref(), Some("summary 2"));

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[1].ends_with(
            "[Input Conversation]\n[user]\nI live in Lisbon\n\n[agent]\nsummary 1\n"
        ));
    }

    #[tokio::test]
    async fn test_enrich_without_memories() {
        let backend = RecordingBackend::default();
        let config = EnrichmentConfig {
            model: "m".into(),
            extract_memories: false,
        };
        let pipeline = EnrichmentPipeline::new(&backend, config);
        let raw = chat("c1", &[("user", "Hi"), ("assistant", "Hello")]);

        let processed = pipeline.enrich(&raw).await.unwrap();
        assert!(processed.memories.is_none());
        assert_eq!(backend.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_only_conversation_makes_no_summary_calls() {
        let backend = RecordingBackend::default();
        let pipeline = EnrichmentPipeline::new(
            &backend,
            EnrichmentConfig {
                model: "m".into(),
                extract_memories: false,
            },
        );
        let raw = chat("c1", &[("user", "anyone there?")]);
        let processed = pipeline.process(&raw).await.unwrap();
        assert_eq!(processed.turns, vec![Turn::user("anyone there?")]);
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_propagates_backend_error() {
        let pipeline = EnrichmentPipeline::new(&FailingBackend, EnrichmentConfig::new("m"));
        let raw = chat("c1", &[("user", "Hi"), ("assistant", "Hello")]);
        let err = pipeline.process(&raw).await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
    }

    #[tokio::test]
    async fn test_run_batch_with_failures_reports_each() {
        let pipeline = EnrichmentPipeline::new(&FailingBackend, EnrichmentConfig::new("m"));
        let batch = vec![
            chat("a", &[("user", "Hi"), ("assistant", "Hello")]),
            chat("b", &[("user", "Hey"), ("assistant", "Yo")]),
        ];
        let report = pipeline.run_batch(&batch).await;
        assert!(report.conversations.is_empty());
        assert_eq!(report.metrics.total, 2);
        assert_eq!(report.metrics.failed, 2);
        assert_eq!(report.failures[0].id, "a");
        assert_eq!(report.failures[1].title, "Conversation b");
    }

    #[tokio::test]
    async fn test_run_batch_empty() {
        let backend = RecordingBackend::default();
        let pipeline = EnrichmentPipeline::new(&backend, EnrichmentConfig::new("m"));
        let report = pipeline.run_batch(&[]).await;
        assert_eq!(report.metrics.total, 0);
        assert_eq!(report.metrics.processed, 0);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_preview_is_char_safe() {
        let text = "é".repeat(80);
        assert_eq!(preview(&text).chars().count(), PREVIEW_CHARS);
    }
}
