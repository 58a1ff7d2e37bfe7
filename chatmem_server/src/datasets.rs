//! Discovery and validation of processed dataset files under the data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use chatmem_core::storage::{looks_like_raw_archive, parse_processed_value};
use chatmem_core::{StoredDataset, StoredFormat};

/// Directories deeper than this below the data dir are not scanned.
const MAX_DEPTH: usize = 8;

/// One loadable file as listed by `/api/files`.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetFile {
    pub path: String,
    pub name: String,
    /// Parent directory relative to the data directory (`""` at the root).
    pub directory: String,
    pub conversations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
}

/// Read `path` as a processed dataset.
///
/// Unlike [`chatmem_core::load_processed`], every reason the file cannot be
/// served is an error: unreadable, invalid JSON, a raw archive, or an
/// unrecognized shape.
pub fn read_dataset(path: &Path) -> Result<StoredDataset> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents).context("File is not valid JSON")?;
    if looks_like_raw_archive(&value) {
        anyhow::bail!("File is a raw conversation archive, not processed output");
    }
    match parse_processed_value(value)? {
        StoredFormat::Unrecognized => anyhow::bail!("Unrecognized dataset format"),
        format => Ok(format.into_dataset()),
    }
}

/// Every readable dataset under `data_dir`, sorted by path.
pub fn discover_datasets(data_dir: &Path) -> Vec<DatasetFile> {
    let mut found = Vec::new();
    scan_dir(data_dir, data_dir, 0, &mut found);
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

/// The most recently modified dataset under `data_dir`.
pub fn latest_dataset(data_dir: &Path) -> Option<PathBuf> {
    discover_datasets(data_dir)
        .into_iter()
        .max_by_key(|f| f.modified)
        .map(|f| PathBuf::from(f.path))
}

fn scan_dir(root: &Path, dir: &Path, depth: usize, found: &mut Vec<DatasetFile>) {
    if depth > MAX_DEPTH {
        return;
    }
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!("Skipping {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if !file_name.starts_with('.') {
                scan_dir(root, &path, depth + 1, found);
            }
            continue;
        }
        if !file_type.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        match read_dataset(&path) {
            Ok(dataset) => {
                let directory = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                found.push(DatasetFile {
                    path: path.display().to_string(),
                    name: file_name,
                    directory,
                    conversations: dataset.conversations.len(),
                    model: dataset.metadata.map(|m| m.model),
                    modified: entry.metadata().and_then(|m| m.modified()).ok(),
                });
            }
            Err(e) => debug!("Not listing {}: {:#}", path.display(), e),
        }
    }
}
