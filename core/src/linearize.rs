//! # Conversation Graph Linearization
//!
//! Archives store each conversation as an append-only tree: edits and
//! regenerations create sibling branches, and `current_node` records the leaf
//! the user was looking at. The visible conversation is the single path from
//! that leaf to the root.
//!
//! [`linearize`] walks that path backwards through `parent` links, turns every
//! node with renderable content into a [`CleanMessage`], and reverses the
//! result into chronological order.
//!
//! Traversal never fails:
//! - a node id missing from `mapping` truncates the walk at that point,
//! - nodes without a message (root, structural entries) are skipped,
//! - a parent chain that loops back on itself stops at the first repeat.

use std::collections::HashSet;

use chrono::{Local, TimeZone};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{CleanMessage, ImageRef, LinearConversation, Message, RawConversation, Role};

/// Output format of [`format_timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reconstruct the visible message history of a conversation in
/// chronological order.
pub fn linearize(conversation: &RawConversation) -> Vec<CleanMessage> {
    let mut messages = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut cursor = conversation.current_node.as_deref();

    while let Some(node_id) = cursor {
        if !visited.insert(node_id) {
            debug!(
                conversation = conversation.id.as_str(),
                node = node_id,
                "Parent chain revisits a node, stopping traversal"
            );
            break;
        }
        let Some(node) = conversation.mapping.get(node_id) else {
            debug!(
                conversation = conversation.id.as_str(),
                node = node_id,
                "Node missing from mapping, truncating traversal"
            );
            break;
        };

        if let Some(message) = &node.message {
            if let Some(clean) = clean_message(message) {
                messages.push(clean);
            }
        }

        cursor = node.parent.as_deref();
    }

    messages.reverse();
    messages
}

/// Build a [`CleanMessage`] from a raw message, or `None` when the message has
/// neither text nor attachments.
pub fn clean_message(message: &Message) -> Option<CleanMessage> {
    let parts = message.content.as_ref()?.parts.as_ref()?.as_array()?;
    if parts.is_empty() {
        return None;
    }

    let mut text = String::new();
    let mut images = Vec::new();
    for part in parts {
        match part {
            Value::String(s) => text.push_str(s),
            Value::Object(obj) => {
                if let Some(image) = image_ref(obj) {
                    images.push(image);
                }
            }
            _ => {}
        }
    }

    if text.is_empty() && images.is_empty() {
        return None;
    }

    let mut clean = CleanMessage::new(Role::from(message.author.role.as_str()), text);
    // Epoch zero is how exports mark an unknown time.
    clean.timestamp = message
        .create_time
        .filter(|t| *t != 0.0)
        .and_then(format_timestamp);
    if !images.is_empty() {
        clean.images = Some(images);
    }

    if let Some(metadata) = &message.metadata {
        copy_metadata(metadata, &mut clean);
    }

    Some(clean)
}

/// Recognize a structured part as an attachment: it either has an
/// `asset_pointer` or a `content_type` mentioning "image".
fn image_ref(part: &Map<String, Value>) -> Option<ImageRef> {
    let content_type = part
        .get("content_type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let is_image =
        content_type.to_lowercase().contains("image") || part.contains_key("asset_pointer");
    if !is_image {
        return None;
    }

    Some(ImageRef {
        content_type: content_type.to_string(),
        asset_pointer: part
            .get("asset_pointer")
            .and_then(Value::as_str)
            .map(str::to_string),
        image_url: part.get("image_url").cloned(),
        metadata: part.get("metadata").cloned(),
    })
}

fn copy_metadata(metadata: &Map<String, Value>, clean: &mut CleanMessage) {
    clean.model_slug = string_field(metadata, "model_slug");
    clean.finish_reason = metadata
        .get("finish_details")
        .and_then(|details| details.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string);
    clean.weight = metadata.get("weight").cloned();
    clean.end_turn = metadata.get("end_turn").cloned();
    clean.recipient = metadata.get("recipient").cloned();
    clean.citations = metadata.get("citations").cloned();
    clean.command = metadata.get("command").cloned();
}

fn string_field(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Convert epoch seconds to a local-time `YYYY-MM-DD HH:MM:SS` string.
///
/// Returns `None` for values that do not map to a representable instant.
pub fn format_timestamp(epoch_secs: f64) -> Option<String> {
    if !epoch_secs.is_finite() {
        return None;
    }
    let secs = epoch_secs.floor();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    let nanos = ((epoch_secs - secs) * 1e9) as u32;
    Local
        .timestamp_opt(secs as i64, nanos.min(999_999_999))
        .single()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// Linearize and keep conversations whose title contains `keyword`
/// (case-insensitive) and which have at least `min_messages` visible messages.
pub fn filter_conversations(
    conversations: &[RawConversation],
    keyword: Option<&str>,
    min_messages: usize,
) -> Vec<LinearConversation> {
    let keyword = keyword.map(str::to_lowercase);
    conversations
        .iter()
        .filter(|conv| title_matches(conv, keyword.as_deref()))
        .filter_map(|conv| {
            let messages = linearize(conv);
            (messages.len() >= min_messages).then(|| LinearConversation {
                id: conv.id.clone(),
                title: conv.display_title().to_string(),
                messages,
            })
        })
        .collect()
}

/// Whether a raw conversation passes the same predicate as
/// [`filter_conversations`].
pub fn matches_filter(
    conversation: &RawConversation,
    keyword: Option<&str>,
    min_messages: usize,
) -> bool {
    let keyword = keyword.map(str::to_lowercase);
    title_matches(conversation, keyword.as_deref())
        && (min_messages == 0 || linearize(conversation).len() >= min_messages)
}

fn title_matches(conversation: &RawConversation, lowered_keyword: Option<&str>) -> bool {
    match lowered_keyword {
        Some(kw) => conversation.display_title().to_lowercase().contains(kw),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation(value: Value) -> RawConversation {
        serde_json::from_value(value).unwrap()
    }

    fn basic_conversation() -> RawConversation {
        conversation(json!({
            "id": "conv-1",
            "title": "Greeting",
            "mapping": {
                "root": {"message": null, "parent": null},
                "msg1": {
                    "message": {
                        "content": {"parts": ["Hello"]},
                        "author": {"role": "user"},
                        "create_time": 1234567890
                    },
                    "parent": "root"
                },
                "msg2": {
                    "message": {
                        "content": {"parts": ["Hi there!"]},
                        "author": {"role": "assistant"},
                        "create_time": 1234567891,
                        "metadata": {"model_slug": "gpt-4"}
                    },
                    "parent": "msg1"
                }
            },
            "current_node": "msg2"
        }))
    }

    #[test]
    fn test_linearize_basic_chain() {
        let messages = linearize(&basic_conversation());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "Hello");
        assert!(messages[0].model_slug.is_none());
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text, "Hi there!");
        assert_eq!(messages[1].model_slug.as_deref(), Some("gpt-4"));
    }

    #[test]
    fn test_linearize_chronological_order() {
        let messages = linearize(&basic_conversation());
        assert_eq!(messages[0].timestamp, format_timestamp(1234567890.0));
        assert_eq!(messages[1].timestamp, format_timestamp(1234567891.0));
        assert!(messages[0].timestamp <= messages[1].timestamp);
    }

    #[test]
    fn test_linearize_ignores_abandoned_branch() {
        let conv = conversation(json!({
            "mapping": {
                "root": {"message": null, "parent": null},
                "q": {"message": {"content": {"parts": ["Question"]}, "author": {"role": "user"}}, "parent": "root"},
                "old": {"message": {"content": {"parts": ["First answer"]}, "author": {"role": "assistant"}}, "parent": "q"},
                "new": {"message": {"content": {"parts": ["Regenerated answer"]}, "author": {"role": "assistant"}}, "parent": "q"}
            },
            "current_node": "new"
        }));
        let texts: Vec<_> = linearize(&conv).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["Question", "Regenerated answer"]);
    }

    #[test]
    fn test_linearize_truncates_at_missing_node() {
        let conv = conversation(json!({
            "mapping": {
                "msg2": {"message": {"content": {"parts": ["Tail"]}, "author": {"role": "assistant"}}, "parent": "gone"}
            },
            "current_node": "msg2"
        }));
        let messages = linearize(&conv);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Tail");
    }

    #[test]
    fn test_linearize_missing_current_node() {
        let conv = conversation(json!({"mapping": {}, "current_node": "nowhere"}));
        assert!(linearize(&conv).is_empty());
        let conv = conversation(json!({"mapping": {}}));
        assert!(linearize(&conv).is_empty());
    }

    #[test]
    fn test_linearize_null_message_in_middle_does_not_stop_walk() {
        let conv = conversation(json!({
            "mapping": {
                "root": {"message": null, "parent": null},
                "a": {"message": {"content": {"parts": ["A"]}, "author": {"role": "user"}}, "parent": "root"},
                "sys": {"message": null, "parent": "a"},
                "b": {"message": {"content": {"parts": ["B"]}, "author": {"role": "assistant"}}, "parent": "sys"}
            },
            "current_node": "b"
        }));
        let texts: Vec<_> = linearize(&conv).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn test_linearize_terminates_on_cycle() {
        let conv = conversation(json!({
            "mapping": {
                "a": {"message": {"content": {"parts": ["A"]}, "author": {"role": "user"}}, "parent": "b"},
                "b": {"message": {"content": {"parts": ["B"]}, "author": {"role": "assistant"}}, "parent": "a"}
            },
            "current_node": "b"
        }));
        let texts: Vec<_> = linearize(&conv).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn test_linearize_text_and_image_parts() {
        let conv = conversation(json!({
            "mapping": {
                "root": {"message": null, "parent": null},
                "msg1": {
                    "message": {
                        "content": {"parts": [
                            "Look:",
                            {"content_type": "image_asset_pointer", "asset_pointer": "file-abc"}
                        ]},
                        "author": {"role": "user"},
                        "create_time": 1234567890
                    },
                    "parent": "root"
                }
            },
            "current_node": "msg1"
        }));
        let messages = linearize(&conv);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Look:");
        assert_eq!(
            messages[0].images,
            Some(vec![ImageRef {
                content_type: "image_asset_pointer".into(),
                asset_pointer: Some("file-abc".into()),
                image_url: None,
                metadata: None,
            }])
        );
        let value = serde_json::to_value(&messages[0].images).unwrap();
        assert_eq!(
            value,
            json!([{"content_type": "image_asset_pointer", "asset_pointer": "file-abc"}])
        );
    }

    #[test]
    fn test_image_only_message_kept_with_empty_text() {
        let conv = conversation(json!({
            "mapping": {
                "msg1": {
                    "message": {
                        "content": {"parts": [{
                            "content_type": "image_asset_pointer",
                            "asset_pointer": "file-xyz789",
                            "image_url": "https://example.com/image.png",
                            "metadata": {"width": 1024, "height": 768}
                        }]},
                        "author": {"role": "user"}
                    },
                    "parent": null
                }
            },
            "current_node": "msg1"
        }));
        let messages = linearize(&conv);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "");
        let image = &messages[0].images.as_ref().unwrap()[0];
        assert_eq!(image.image_url, Some(json!("https://example.com/image.png")));
        assert_eq!(image.metadata.as_ref().unwrap()["width"], json!(1024));
    }

    #[test]
    fn test_non_image_object_parts_are_invisible() {
        let conv = conversation(json!({
            "mapping": {
                "tool": {
                    "message": {
                        "content": {"parts": [{"content_type": "tether_browsing_display", "result": "..."}]},
                        "author": {"role": "tool"}
                    },
                    "parent": null
                }
            },
            "current_node": "tool"
        }));
        assert!(linearize(&conv).is_empty());
    }

    #[test]
    fn test_parts_not_a_list_yields_nothing() {
        let conv = conversation(json!({
            "mapping": {
                "code": {
                    "message": {
                        "content": {"content_type": "code", "parts": "print('x')"},
                        "author": {"role": "assistant"}
                    },
                    "parent": null
                }
            },
            "current_node": "code"
        }));
        assert!(linearize(&conv).is_empty());
    }

    #[test]
    fn test_empty_text_without_images_dropped() {
        let conv = conversation(json!({
            "mapping": {
                "m": {"message": {"content": {"parts": [""]}, "author": {"role": "system"}}, "parent": null}
            },
            "current_node": "m"
        }));
        assert!(linearize(&conv).is_empty());
    }

    #[test]
    fn test_text_parts_concatenated_in_order() {
        let conv = conversation(json!({
            "mapping": {
                "m": {"message": {"content": {"parts": ["one ", {"content_type": "text"}, "two"]}, "author": {"role": "user"}}, "parent": null}
            },
            "current_node": "m"
        }));
        assert_eq!(linearize(&conv)[0].text, "one two");
    }

    #[test]
    fn test_metadata_copy_through() {
        let conv = conversation(json!({
            "mapping": {
                "m": {
                    "message": {
                        "content": {"parts": ["Searching..."]},
                        "author": {"role": "assistant"},
                        "metadata": {
                            "model_slug": "gpt-4o",
                            "finish_details": {"type": "stop", "stop_tokens": [100260]},
                            "weight": 1.0,
                            "end_turn": true,
                            "recipient": "browser",
                            "citations": [{"start_ix": 0, "end_ix": 5}],
                            "command": "search"
                        }
                    },
                    "parent": null
                }
            },
            "current_node": "m"
        }));
        let msg = &linearize(&conv)[0];
        assert_eq!(msg.finish_reason.as_deref(), Some("stop"));
        assert_eq!(msg.weight, Some(json!(1.0)));
        assert_eq!(msg.end_turn, Some(json!(true)));
        assert_eq!(msg.recipient, Some(json!("browser")));
        assert_eq!(msg.citations, Some(json!([{"start_ix": 0, "end_ix": 5}])));
        assert_eq!(msg.command, Some(json!("search")));
    }

    #[test]
    fn test_metadata_keys_kept_whatever_their_type() {
        let conv = conversation(json!({
            "mapping": {
                "m": {
                    "message": {
                        "content": {"parts": ["ok"]},
                        "author": {"role": "assistant"},
                        "metadata": {
                            "weight": "1",
                            "end_turn": null,
                            "recipient": {"name": "python"},
                            "citations": {"start_ix": 0},
                            "command": ["search", "open"]
                        }
                    },
                    "parent": null
                }
            },
            "current_node": "m"
        }));
        let msg = &linearize(&conv)[0];
        assert_eq!(msg.weight, Some(json!("1")));
        assert_eq!(msg.end_turn, Some(Value::Null));
        assert_eq!(msg.recipient, Some(json!({"name": "python"})));
        assert_eq!(msg.citations, Some(json!({"start_ix": 0})));
        assert_eq!(msg.command, Some(json!(["search", "open"])));

        let value = serde_json::to_value(msg).unwrap();
        assert!(value.as_object().unwrap().contains_key("end_turn"));
    }

    #[test]
    fn test_zero_create_time_gives_null_timestamp() {
        let conv = conversation(json!({
            "mapping": {
                "m": {"message": {"content": {"parts": ["x"]}, "author": {"role": "user"}, "create_time": 0}, "parent": null}
            },
            "current_node": "m"
        }));
        assert!(linearize(&conv)[0].timestamp.is_none());
    }

    #[test]
    fn test_missing_create_time_gives_null_timestamp() {
        let conv = conversation(json!({
            "mapping": {
                "m": {"message": {"content": {"parts": ["x"]}, "author": {"role": "user"}, "create_time": null}, "parent": null}
            },
            "current_node": "m"
        }));
        assert!(linearize(&conv)[0].timestamp.is_none());
    }

    #[test]
    fn test_format_timestamp_shape() {
        let formatted = format_timestamp(1_700_000_000.75).unwrap();
        assert_eq!(formatted.len(), 19);
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[10..11], " ");
        assert_eq!(&formatted[13..14], ":");
        assert!(format_timestamp(f64::NAN).is_none());
        assert!(format_timestamp(f64::INFINITY).is_none());
    }

    fn titled(id: &str, title: &str, n_user_messages: usize) -> RawConversation {
        let mut mapping = serde_json::Map::new();
        mapping.insert("root".into(), json!({"message": null, "parent": null}));
        let mut parent = "root".to_string();
        for i in 0..n_user_messages {
            let node_id = format!("m{i}");
            mapping.insert(
                node_id.clone(),
                json!({
                    "message": {"content": {"parts": [format!("msg {i}")]}, "author": {"role": "user"}},
                    "parent": parent
                }),
            );
            parent = node_id;
        }
        conversation(json!({"id": id, "title": title, "mapping": mapping, "current_node": parent}))
    }

    #[test]
    fn test_filter_conversations_by_keyword() {
        let convs = vec![
            titled("1", "Python coding help", 1),
            titled("2", "Recipe for pasta", 1),
            titled("3", "Python debugging", 1),
        ];
        let filtered = filter_conversations(&convs, Some("python"), 0);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|c| c.title.to_lowercase().contains("python")));
    }

    #[test]
    fn test_filter_conversations_by_min_messages() {
        let convs = vec![titled("1", "Short chat", 1), titled("2", "Long chat", 3)];
        let filtered = filter_conversations(&convs, None, 2);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "2");
        assert_eq!(filtered[0].messages.len(), 3);

        assert!(!matches_filter(&convs[0], None, 2));
        assert!(matches_filter(&convs[1], Some("LONG"), 2));
    }
}
