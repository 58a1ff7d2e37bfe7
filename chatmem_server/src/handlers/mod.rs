//! Axum route handlers for the conversation viewer.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;
use tracing::{info, warn};

use chatmem_core::ProcessedConversation;

use crate::datasets::{discover_datasets, read_dataset};
use crate::error::AppError;
use crate::state::{Dataset, ViewerState};
use crate::types::*;

const INDEX_TEMPLATE: &str = include_str!("../../static/index.html");

/// Landing page with the conversation count and current file filled in.
pub async fn index_handler(State(state): State<Arc<ViewerState>>) -> Html<String> {
    let dataset = state.dataset.current();
    Html(render_index(dataset.len(), &dataset.source_display()))
}

fn render_index(total_conversations: usize, current_file: &str) -> String {
    INDEX_TEMPLATE
        .replace("{{total_conversations}}", &total_conversations.to_string())
        .replace("{{current_file}}", &escape_html(current_file))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Conversation at a 0-based index of the current dataset.
///
/// Anything that is not an in-range non-negative integer is a 404.
pub async fn get_conversation_handler(
    State(state): State<Arc<ViewerState>>,
    Path(index): Path<String>,
) -> Result<Json<ProcessedConversation>, AppError> {
    let dataset = state.dataset.current();
    index
        .parse::<usize>()
        .ok()
        .and_then(|i| dataset.conversations.get(i))
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::not_found("Index out of range"))
}

/// Loadable datasets under the data directory.
pub async fn list_files_handler(
    State(state): State<Arc<ViewerState>>,
) -> Result<Json<FilesResponse>, AppError> {
    let data_dir = state.data_dir.clone();
    let files = tokio::task::spawn_blocking(move || discover_datasets(&data_dir))
        .await
        .map_err(|e| AppError::internal(format!("File scan failed: {}", e)))?;

    Ok(Json(FilesResponse {
        files,
        current_file: state.dataset.current().source_display(),
        data_dir: state.data_dir.display().to_string(),
    }))
}

pub async fn metadata_handler(State(state): State<Arc<ViewerState>>) -> Json<MetadataResponse> {
    let dataset = state.dataset.current();
    Json(MetadataResponse {
        metadata: dataset.metadata.clone(),
        file: dataset.source_display(),
        total_conversations: dataset.len(),
    })
}

/// Replace the served dataset with the file named in the request body.
pub async fn load_file_handler(
    State(state): State<Arc<ViewerState>>,
    body: Result<Json<LoadFileRequest>, JsonRejection>,
) -> Result<Json<LoadFileResponse>, AppError> {
    let Json(req) = body.map_err(|e| AppError::bad_request(e.body_text()))?;
    let file_path = req
        .file_path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("No file_path provided"))?;

    let path = PathBuf::from(&file_path);
    if !path.is_file() {
        return Err(AppError::not_found(format!("File not found: {}", file_path)));
    }

    let read_path = path.clone();
    let stored = tokio::task::spawn_blocking(move || read_dataset(&read_path))
        .await
        .map_err(|e| AppError::internal(format!("File load failed: {}", e)))?
        .map_err(|e| {
            warn!("Rejected dataset {}: {:#}", file_path, e);
            AppError::bad_request(format!("Invalid dataset file: {:#}", e))
        })?;

    let dataset = state.dataset.replace(Dataset::from_stored(stored, path));
    info!(
        file = file_path.as_str(),
        conversations = dataset.len(),
        "Dataset loaded"
    );

    Ok(Json(LoadFileResponse {
        success: true,
        file: dataset.source_display(),
        total_conversations: dataset.len(),
        metadata: dataset.metadata.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_index_fills_placeholders() {
        let html = render_index(12, "data/prod/convs.json");
        assert!(html.contains("12"));
        assert!(html.contains("data/prod/convs.json"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_index_escapes_file_name() {
        let html = render_index(0, "<script>alert('x')</script>.json");
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;.json"));
    }
}
