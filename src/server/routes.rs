use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    // multipart 有 base64 之外的表单开销，给图片上限留一点余量
    let body_limit = state.config.max_image_bytes + 64 * 1024;

    Router::new()
        .route(
            "/api/generate",
            post(handlers::create_generation).get(handlers::generation_status),
        )
        .route(
            "/api/generate-video",
            post(handlers::create_video_generation).get(handlers::video_generation_status),
        )
        .route("/api/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
