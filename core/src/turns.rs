//! Processed turns and their flattened prompt-context form.
//!
//! A [`Turn`] is either a user message or an assistant reply paired with its
//! LLM summary. On disk the two cases keep the established key layout
//! (`{"user": ...}` and `{"assistant": ..., "summarised_conversation": ...}`);
//! in memory they are an explicit enum so no code dispatches on key presence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::null_as_empty;

/// JSON key holding a user turn's text.
pub const USER_KEY: &str = "user";
/// JSON key holding an assistant turn's raw reply.
pub const ASSISTANT_KEY: &str = "assistant";
/// JSON key holding an assistant turn's LLM summary.
pub const SUMMARY_KEY: &str = "summarised_conversation";

/// One exchange unit of a processed conversation.
///
/// Deserialization tries `Assistant` first, so a stray mapping carrying both
/// `user` and `assistant` keys resolves to the assistant case deterministically.
/// A `null` text or summary reads as the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Turn {
    Assistant {
        #[serde(rename = "assistant", deserialize_with = "null_as_empty")]
        text: String,
        #[serde(
            rename = "summarised_conversation",
            default,
            deserialize_with = "null_as_empty"
        )]
        summary: String,
    },
    User {
        #[serde(rename = "user", deserialize_with = "null_as_empty")]
        text: String,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>, summary: impl Into<String>) -> Self {
        Turn::Assistant {
            text: text.into(),
            summary: summary.into(),
        }
    }

    /// Raw message text (user input or assistant reply).
    pub fn text(&self) -> &str {
        match self {
            Turn::User { text } | Turn::Assistant { text, .. } => text,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Turn::User { .. })
    }
}

/// Which assistant text an `[agent]` block carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgentText {
    /// The LLM summary (`summarised_conversation`).
    #[default]
    Summary,
    /// The original assistant reply (`assistant`).
    Reply,
}

/// Render a turn as a tagged text block for LLM prompt context.
pub fn flatten(turn: &Turn, agent: AgentText) -> String {
    match (turn, agent) {
        (Turn::User { text }, _) => format!("[user]\n{text}\n"),
        (Turn::Assistant { summary, .. }, AgentText::Summary) => format!("[agent]\n{summary}\n"),
        (Turn::Assistant { text, .. }, AgentText::Reply) => format!("[agent]\n{text}\n"),
    }
}

/// Flatten every turn with summaries as agent text, joined by newlines.
pub fn flatten_all(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| flatten(turn, AgentText::Summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten an untyped turn mapping by key: `user` renders a user block,
/// `agent_key` an agent block, anything else the empty string.
///
/// `user` takes precedence when both keys are present.
pub fn flatten_value(turn: &Map<String, Value>, agent_key: &str) -> String {
    if let Some(text) = turn.get(USER_KEY) {
        return format!("[user]\n{}\n", value_text(text));
    }
    if let Some(text) = turn.get(agent_key) {
        return format!("[agent]\n{}\n", value_text(text));
    }
    String::new()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
