//! Batch run behind the `chatmem` binary.
//!
//! Load, filter, sample, enrich, save. The only outcomes that fail the run
//! are an input with no conversations and a filter that matches none;
//! skipped conversations and a failed save are logged and the run still
//! succeeds.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info, warn};

use chatmem_core::{
    create_metadata, load_archive, matches_filter, resolve_seed, sample_conversations,
    save_conversations, SamplingRecord,
};
use chatmem_extraction::{prompt_set, CompletionBackend, EnrichmentConfig, EnrichmentPipeline};

/// Inputs of one batch run, resolved from CLI flags and config.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub model: String,
    /// `"local"` or `"openai"`, recorded in the output metadata.
    pub llm_mode: String,
    /// Sample size; `None` processes everything.
    pub sample: Option<usize>,
    pub prod: bool,
    pub prod_seed: u64,
    pub extract_memories: bool,
    pub keyword: Option<String>,
    pub min_messages: usize,
}

/// How a batch run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The archive was missing, unreadable or empty.
    NoConversations,
    /// The keyword / minimum-length filter left nothing to process.
    NoMatches,
    Saved {
        output: PathBuf,
        processed: usize,
        failed: usize,
    },
    /// Processing finished but writing the output file failed.
    SaveFailed { processed: usize, failed: usize },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::NoConversations | RunOutcome::NoMatches)
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

pub async fn run_processing(
    options: &ProcessOptions,
    backend: &dyn CompletionBackend,
) -> RunOutcome {
    info!("Loading conversations from {}...", options.input.display());
    let mut conversations = load_archive(&options.input);
    if conversations.is_empty() {
        error!("No conversations found. Exiting.");
        return RunOutcome::NoConversations;
    }
    info!("Loaded {} conversations", conversations.len());

    if options.keyword.is_some() || options.min_messages > 0 {
        let keyword = options.keyword.as_deref();
        conversations.retain(|c| matches_filter(c, keyword, options.min_messages));
        info!(
            keyword = keyword.unwrap_or(""),
            min_messages = options.min_messages,
            "{} conversations match the filter",
            conversations.len()
        );
        if conversations.is_empty() {
            error!("No conversations match the filter. Exiting.");
            return RunOutcome::NoMatches;
        }
    }

    let mut sampling = None;
    if let Some(n) = options.sample.filter(|n| *n > 0) {
        let seed = resolve_seed(options.prod, options.prod_seed);
        info!("Random seed: {}", seed);
        if n < conversations.len() {
            info!("Sampling {} conversations...", n);
            conversations = sample_conversations(conversations, n, seed);
        }
        sampling = Some(SamplingRecord {
            random_seed: seed,
            n_samples: n,
        });
    }

    info!("Processing {} conversations...", conversations.len());
    let pipeline = EnrichmentPipeline::new(
        backend,
        EnrichmentConfig {
            model: options.model.clone(),
            extract_memories: options.extract_memories,
        },
    );
    let report = pipeline.run_batch(&conversations).await;
    for failure in &report.failures {
        warn!(
            "Skipped conversation {} ({}): {}",
            failure.id, failure.title, failure.error
        );
    }

    let metadata = create_metadata(&options.model, &options.llm_mode, prompt_set(), sampling);
    let processed = report.metrics.processed;
    let failed = report.metrics.failed;

    info!("Saving to {}...", options.output.display());
    match save_conversations(&options.output, &report.conversations, Some(&metadata)) {
        Ok(()) => {
            info!(
                processed,
                failed,
                duration_ms = report.metrics.total_us / 1000,
                "Done!"
            );
            RunOutcome::Saved {
                output: options.output.clone(),
                processed,
                failed,
            }
        }
        Err(e) => {
            error!("Error saving conversations: {:#}", e);
            RunOutcome::SaveFailed { processed, failed }
        }
    }
}
