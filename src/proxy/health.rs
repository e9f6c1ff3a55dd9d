use axum::response::{IntoResponse, Json, Response};

use crate::proxy::handlers::common::current_request_id;

pub async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "ok": true,
        "data": {
            "status": "healthy",
            "timestamp": chrono::Utc::now().timestamp_millis(),
        },
        "requestId": current_request_id(),
    }))
    .into_response()
}
