//! Route table of the viewer.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::ViewerState;

/// Build the viewer's Axum router over `state`.
pub fn viewer_router(state: Arc<ViewerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index_handler))
        .route(
            "/api/conversation/{index}",
            get(handlers::get_conversation_handler),
        )
        .route("/api/files", get(handlers::list_files_handler))
        .route("/api/metadata", get(handlers::metadata_handler))
        .route("/api/load-file", post(handlers::load_file_handler))
        // Middleware (order matters: first added = outermost)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
