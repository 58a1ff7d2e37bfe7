//! Application state shared across all viewer request handlers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chatmem_core::{ProcessedConversation, ProcessingMetadata, StoredDataset};

/// The dataset the viewer is currently serving.
#[derive(Debug, Default)]
pub struct Dataset {
    pub conversations: Vec<ProcessedConversation>,
    pub metadata: Option<ProcessingMetadata>,
    /// File the dataset was read from; `None` for the empty startup dataset.
    pub source: Option<PathBuf>,
}

impl Dataset {
    pub fn from_stored(stored: StoredDataset, source: impl Into<PathBuf>) -> Self {
        Self {
            conversations: stored.conversations,
            metadata: stored.metadata,
            source: Some(source.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Display form of [`source`](Self::source), empty when unset.
    pub fn source_display(&self) -> String {
        self.source
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

/// Swappable owner of the served dataset.
///
/// Readers take a cheap `Arc` snapshot; a load replaces the whole dataset at
/// once, so a request never sees conversations from one file paired with
/// metadata from another.
#[derive(Debug, Default)]
pub struct DatasetHandle {
    inner: RwLock<Arc<Dataset>>,
}

impl DatasetHandle {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            inner: RwLock::new(Arc::new(dataset)),
        }
    }

    pub fn current(&self) -> Arc<Dataset> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Install `dataset` and return the snapshot now being served.
    pub fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let next = Arc::new(dataset);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&next);
        next
    }
}

/// Shared viewer state threaded through Axum handlers.
///
/// Wrapped in `Arc` and shared via Axum's `State` extractor.
pub struct ViewerState {
    pub dataset: DatasetHandle,
    /// Root scanned by `/api/files`.
    pub data_dir: PathBuf,
}

impl ViewerState {
    pub fn new(dataset: Dataset, data_dir: impl AsRef<Path>) -> Self {
        Self {
            dataset: DatasetHandle::new(dataset),
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }
}
