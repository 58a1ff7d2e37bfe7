//! JSON request/response types for the viewer API.

use serde::{Deserialize, Serialize};

use chatmem_core::ProcessingMetadata;

use crate::datasets::DatasetFile;

/// Response of `GET /api/files`.
#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<DatasetFile>,
    /// File currently served (`""` when nothing is loaded).
    pub current_file: String,
    pub data_dir: String,
}

/// Response of `GET /api/metadata`.
#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub metadata: Option<ProcessingMetadata>,
    pub file: String,
    pub total_conversations: usize,
}

/// Body of `POST /api/load-file`.
#[derive(Debug, Deserialize)]
pub struct LoadFileRequest {
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Response of a successful `POST /api/load-file`.
#[derive(Debug, Serialize)]
pub struct LoadFileResponse {
    pub success: bool,
    pub file: String,
    pub total_conversations: usize,
    pub metadata: Option<ProcessingMetadata>,
}
