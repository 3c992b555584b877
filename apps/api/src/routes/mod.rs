pub mod health;
pub mod pdf;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/pdf", post(pdf::handle_render_pdf))
        .route("/api/pdf/:filename", post(pdf::handle_render_named_pdf))
        .layer(body_limit)
        .with_state(state)
}
