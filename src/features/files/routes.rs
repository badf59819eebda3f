//! File routes

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::files::handlers;
use crate::features::files::services::FileService;
use crate::shared::constants::MAX_FILE_SIZE;

/// Create routes for the files feature
pub fn routes(file_service: Arc<FileService>) -> Router {
    Router::new()
        .route(
            "/api/files/upload",
            // Allow body size up to MAX_FILE_SIZE + buffer for multipart overhead
            post(handlers::upload_file).layer(DefaultBodyLimit::max(MAX_FILE_SIZE + 1024 * 1024)),
        )
        .route("/api/files/link", post(handlers::link_file))
        .route("/api/files/generate", get(handlers::generate_file))
        .route(
            "/api/files/{id}",
            get(handlers::get_file)
                .patch(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/api/files/{id}/content", get(handlers::get_file_content))
        .with_state(file_service)
}

/// Maintenance routes, mounted behind basic auth
pub fn admin_routes(file_service: Arc<FileService>) -> Router {
    Router::new()
        .route("/api/admin/files/migrate", post(handlers::migrate_files))
        .with_state(file_service)
}
