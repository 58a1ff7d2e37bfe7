//! Loading raw platform archives (`conversations.json`).

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::types::RawConversation;

/// Load every conversation of a raw archive file.
///
/// A missing or unparsable file yields an empty list; individual malformed
/// conversations are skipped with a warning so one bad entry does not hide
/// the rest of the archive.
pub fn load_archive(path: impl AsRef<Path>) -> Vec<RawConversation> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Error: could not read archive at {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    let conversations = parse_archive(&contents);
    info!(
        file = %path.display(),
        conversations = conversations.len(),
        "Archive loaded"
    );
    conversations
}

/// Parse archive JSON text. See [`load_archive`] for the failure policy.
pub fn parse_archive(json: &str) -> Vec<RawConversation> {
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            warn!("Archive is not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let Value::Array(items) = value else {
        warn!("Archive top level is not a list of conversations");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            match serde_json::from_value::<RawConversation>(item) {
                Ok(conv) => Some(conv),
                Err(e) => {
                    warn!(index, "Skipping malformed conversation: {}", e);
                    None
                }
            }
        })
        .collect()
}
