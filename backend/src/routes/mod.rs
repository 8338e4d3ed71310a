mod b2;
mod files;
mod health;
mod upload;

use axum::{
    routing::{get, post},
    Router,
};

/// Creates the router with all handler routes
pub fn handler() -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/api/upload", post(upload::upload_file))
        .route("/api/b2", post(b2::handle_action))
        .route("/api/files/{file_name}", get(files::lookup_file))
}
