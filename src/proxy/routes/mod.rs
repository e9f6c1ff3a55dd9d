use axum::{
    routing::{get, post},
    Router,
};

use crate::proxy::handlers;
use crate::proxy::handlers::errors::handle_not_found;
use crate::proxy::state::AppState;

// Wrong-method requests fall through to the same "Route not found" envelope.
pub fn build_api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/health",
            get(crate::proxy::health::health_check_handler).fallback(handle_not_found),
        )
        .route(
            "/api/analyze",
            post(handlers::analyze::handle_analyze).fallback(handle_not_found),
        )
        .route(
            "/api/chat",
            post(handlers::chat::handle_chat).fallback(handle_not_found),
        )
        .route(
            "/api/transcribe",
            post(handlers::transcribe::handle_transcribe).fallback(handle_not_found),
        )
}
