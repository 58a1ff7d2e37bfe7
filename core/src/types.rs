//! Data model for raw chat archives and the records derived from them.
//!
//! Raw archive types ([`RawConversation`], [`Node`], [`Message`]) are read-only
//! input and deserialize leniently: exports in the wild omit or null out most
//! fields. Derived types ([`CleanMessage`], [`ProcessedConversation`],
//! [`ProcessingMetadata`]) define the persisted JSON contract that the viewer
//! and other tooling depend on.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::turns::Turn;

/// Identifier of a node inside a conversation's `mapping`.
pub type NodeId = String;

// ---------------------------------------------------------------------------
// Raw archive
// ---------------------------------------------------------------------------

/// One conversation as exported by the chat platform.
///
/// Messages are stored as a tree in `mapping`; `current_node` names the leaf
/// whose ancestry is the conversation the user actually saw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConversation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub update_time: Option<f64>,
    #[serde(default)]
    pub mapping: HashMap<NodeId, Node>,
    #[serde(default)]
    pub current_node: Option<NodeId>,
}

impl RawConversation {
    /// Title for display and filtering; archives sometimes carry `null`.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}

/// A single entry of the message tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    /// `None` for structural placeholders such as the root.
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub parent: Option<NodeId>,
}

/// A raw message as stored in the archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub content: Option<Content>,
    /// Epoch seconds, possibly fractional.
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub role: String,
}

/// Message content. `parts` is kept as raw JSON because archives mix text
/// strings with structured attachment objects (and occasionally store a
/// non-list value).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub parts: Option<Value>,
}

// ---------------------------------------------------------------------------
// Clean messages
// ---------------------------------------------------------------------------

/// Author role of a clean message.
///
/// Roles outside the four known ones are carried through verbatim so that
/// nothing is silently relabelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "tool" => Role::Tool,
            _ => Role::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a non-text attachment (image or tool asset) found in
/// `content.parts`. Only keys present in the source part are copied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One visible message of a linearized conversation.
///
/// `timestamp` and `model_slug` are always serialized (possibly `null`); the
/// remaining optional fields appear only when the raw metadata carried them.
/// `weight`, `end_turn`, `recipient`, `citations` and `command` are copied
/// verbatim, whatever their JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanMessage {
    pub role: Role,
    pub text: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: Option<String>,
    pub model_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_turn: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Value>,
}

impl CleanMessage {
    /// A bare message with only role and text set.
    pub fn new(role: impl Into<Role>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
            timestamp: None,
            model_slug: None,
            images: None,
            finish_reason: None,
            weight: None,
            end_turn: None,
            recipient: None,
            citations: None,
            command: None,
        }
    }
}

/// A linearized conversation without LLM enrichment (output of filtering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<CleanMessage>,
}

// ---------------------------------------------------------------------------
// Processed conversations
// ---------------------------------------------------------------------------

/// Read a string that older output files may have written as `null`
/// (e.g. a completion with no content). Null becomes the empty string.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A conversation after summary enrichment; the unit persisted to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedConversation {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub update_time: Option<f64>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memories: Option<String>,
}

impl ProcessedConversation {
    /// Empty processed shell carrying the raw conversation's identity fields.
    pub fn from_raw(raw: &RawConversation) -> Self {
        Self {
            id: raw.id.clone(),
            title: raw.title.clone(),
            create_time: raw.create_time,
            update_time: raw.update_time,
            turns: Vec::new(),
            memories: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata envelope
// ---------------------------------------------------------------------------

/// Prompt texts recorded for provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSet {
    pub summarization: String,
    pub memory_extraction: String,
}

/// Sampling parameters of a run. Both keys are written together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingRecord {
    pub random_seed: u64,
    pub n_samples: usize,
}

/// Provenance envelope written next to the processed conversations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub llm_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptSet>,
    #[serde(flatten)]
    pub sampling: Option<SamplingRecord>,
    /// Keys written by other tooling, preserved across load/save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
