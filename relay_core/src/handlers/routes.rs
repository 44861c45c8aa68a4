//! Route table for the share endpoints

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use super::{files, health};
use crate::AppState;

// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn create_routes(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health::handle_health))
        .route(
            "/api/files/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/files/check/:code", get(files::check_file))
        .route("/api/files/download/:code", get(files::download_file))
}
