//! # Processed Conversation Storage
//!
//! Reads and writes the processed-conversation JSON files produced by the
//! enrichment run and consumed by the viewer.
//!
//! ## Supported Formats
//!
//! - **Current**: `{ "conversations": [...], "metadata": {...} }` (metadata optional)
//! - **Legacy**: `[...]` (bare array of conversations, no metadata)
//!
//! Any other top-level value is [`StoredFormat::Unrecognized`] and loads as an
//! empty dataset. The format decision is made once in [`parse_processed`];
//! callers only ever see the normalized [`StoredDataset`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::types::{ProcessedConversation, ProcessingMetadata, PromptSet, SamplingRecord};

/// Prefix of every generated output filename.
pub const OUTPUT_PREFIX: &str = "convs_with_memories";

/// Normalized content of a processed-conversation file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredDataset {
    pub conversations: Vec<ProcessedConversation>,
    pub metadata: Option<ProcessingMetadata>,
}

/// Shape detected at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredFormat {
    /// Bare array written by older versions; carries no metadata.
    Legacy(Vec<ProcessedConversation>),
    /// Object with a `conversations` key and optional `metadata`.
    Wrapped {
        conversations: Vec<ProcessedConversation>,
        metadata: Option<ProcessingMetadata>,
    },
    /// Any other top-level JSON value.
    Unrecognized,
}

impl StoredFormat {
    pub fn into_dataset(self) -> StoredDataset {
        match self {
            StoredFormat::Legacy(conversations) => StoredDataset {
                conversations,
                metadata: None,
            },
            StoredFormat::Wrapped {
                conversations,
                metadata,
            } => StoredDataset {
                conversations,
                metadata,
            },
            StoredFormat::Unrecognized => StoredDataset::default(),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    conversations: &'a [ProcessedConversation],
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a ProcessingMetadata>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Decide the stored format of a JSON document.
///
/// Errors only when the text is not JSON or a recognized shape holds entries
/// that do not deserialize.
pub fn parse_processed(json: &str) -> Result<StoredFormat> {
    let value: Value = serde_json::from_str(json).context("Invalid JSON")?;
    parse_processed_value(value)
}

/// [`parse_processed`] for an already-decoded value.
pub fn parse_processed_value(value: Value) -> Result<StoredFormat> {
    match value {
        Value::Array(items) => {
            let conversations = serde_json::from_value(Value::Array(items))
                .context("Failed to parse legacy conversation list")?;
            Ok(StoredFormat::Legacy(conversations))
        }
        Value::Object(mut obj) if obj.contains_key("conversations") => {
            let conversations = match obj.remove("conversations") {
                Some(Value::Null) | None => Vec::new(),
                Some(v) => serde_json::from_value(v).context("Failed to parse conversations")?,
            };
            let metadata = match obj.remove("metadata") {
                Some(Value::Null) | None => None,
                Some(v) => Some(serde_json::from_value(v).context("Failed to parse metadata")?),
            };
            Ok(StoredFormat::Wrapped {
                conversations,
                metadata,
            })
        }
        _ => Ok(StoredFormat::Unrecognized),
    }
}

/// Whether a bare array looks like a raw platform archive rather than
/// processed output (raw conversations carry a `mapping`).
pub fn looks_like_raw_archive(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .is_some_and(|first| first.contains_key("mapping"))
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load a processed-conversation file.
///
/// A missing file, I/O failure, invalid JSON or unrecognized shape all yield
/// an empty dataset; the cause is logged.
pub fn load_processed(path: impl AsRef<Path>) -> StoredDataset {
    let path = path.as_ref();
    if !path.exists() {
        info!(
            "File {} not found. Starting with an empty conversation history.",
            path.display()
        );
        return StoredDataset::default();
    }

    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Error reading file {}: {}", path.display(), e);
            return StoredDataset::default();
        }
    };

    match parse_processed(&contents) {
        Ok(StoredFormat::Unrecognized) => {
            warn!("Unexpected data format in {}", path.display());
            StoredDataset::default()
        }
        Ok(format) => {
            let legacy = matches!(format, StoredFormat::Legacy(_));
            let dataset = format.into_dataset();
            info!(
                file = %path.display(),
                conversations = dataset.conversations.len(),
                legacy,
                "Loaded processed conversations"
            );
            if let Some(meta) = &dataset.metadata {
                info!(
                    model = meta.model.as_str(),
                    llm_mode = meta.llm_mode.as_str(),
                    git_commit = meta.git_commit.as_deref().unwrap_or("unknown"),
                    "Dataset provenance"
                );
            }
            dataset
        }
        Err(e) => {
            warn!("Error decoding JSON from {}: {:#}", path.display(), e);
            StoredDataset::default()
        }
    }
}

/// Serialize conversations (and metadata, when given) as pretty-printed JSON
/// with 4-space indentation. Non-ASCII text is written literally.
pub fn to_json_pretty(
    conversations: &[ProcessedConversation],
    metadata: Option<&ProcessingMetadata>,
) -> Result<String> {
    let envelope = Envelope {
        conversations,
        metadata,
    };
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    envelope
        .serialize(&mut ser)
        .context("Failed to serialize conversations")?;
    String::from_utf8(buf).context("Serialized JSON was not UTF-8")
}

/// Write the whole file in one go, replacing any existing content.
pub fn save_conversations(
    path: impl AsRef<Path>,
    conversations: &[ProcessedConversation],
    metadata: Option<&ProcessingMetadata>,
) -> Result<()> {
    let path = path.as_ref();
    let json = to_json_pretty(conversations, metadata)?;
    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(
        file = %path.display(),
        conversations = conversations.len(),
        "Conversation history saved"
    );
    if let Some(meta) = metadata {
        info!(
            model = meta.model.as_str(),
            llm_mode = meta.llm_mode.as_str(),
            git_commit = meta.git_commit.as_deref().unwrap_or("unknown"),
            "Saved with metadata"
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output naming + provenance
// ---------------------------------------------------------------------------

/// Strip the characters `:`, `.` and `-` from a model name.
pub fn clean_model_name(model: &str) -> String {
    model.chars().filter(|c| !matches!(*c, ':' | '.' | '-')).collect()
}

/// Build the output path
/// `{data_dir}/{prod|debug}/convs_with_memories_{MMDD}_{model}[_nsamples{N}].json`
/// and create its directory.
pub fn generate_output_filename(
    model: &str,
    n_samples: Option<usize>,
    prod: bool,
    date: NaiveDate,
    data_dir: &Path,
) -> Result<PathBuf> {
    let mut name = format!(
        "{}_{}_{}",
        OUTPUT_PREFIX,
        date.format("%m%d"),
        clean_model_name(model)
    );
    if let Some(n) = n_samples.filter(|n| *n > 0) {
        name.push_str(&format!("_nsamples{n}"));
    }
    name.push_str(".json");

    let directory = data_dir.join(if prod { "prod" } else { "debug" });
    fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create output directory {}", directory.display()))?;
    Ok(directory.join(name))
}

/// [`generate_output_filename`] for today's local date.
pub fn output_path_for_today(
    model: &str,
    n_samples: Option<usize>,
    prod: bool,
    data_dir: &Path,
) -> Result<PathBuf> {
    generate_output_filename(model, n_samples, prod, Local::now().date_naive(), data_dir)
}

/// Current commit hash of the working directory, or `"unknown"`.
pub fn git_commit() -> String {
    match Command::new("git").args(["rev-parse", "HEAD"]).output() {
        Ok(output) if output.status.success() => {
            let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if hash.is_empty() {
                "unknown".to_string()
            } else {
                hash
            }
        }
        Ok(output) => {
            debug!(status = %output.status, "git rev-parse failed");
            "unknown".to_string()
        }
        Err(e) => {
            debug!("git not available: {}", e);
            "unknown".to_string()
        }
    }
}

/// Provenance envelope for a run.
pub fn create_metadata(
    model: &str,
    llm_mode: &str,
    prompts: PromptSet,
    sampling: Option<SamplingRecord>,
) -> ProcessingMetadata {
    ProcessingMetadata {
        processing_timestamp: Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        git_commit: Some(git_commit()),
        model: model.to_string(),
        llm_mode: llm_mode.to_string(),
        prompts: Some(prompts),
        sampling,
        extra: Map::new(),
    }
}
