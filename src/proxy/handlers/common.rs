use axum::{
    body::Body,
    http::{header, HeaderMap},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::DeserializeOwned;

use crate::modules::system::{logger, request_context};
use crate::proxy::config::RateLimitRule;
use crate::proxy::handlers::errors::{ApiError, ErrorCode};
use crate::proxy::rate_limit::RateLimiter;

pub fn current_request_id() -> String {
    request_context::current_request_id().unwrap_or_default()
}

pub fn enforce_rate_limit(
    limiter: &RateLimiter,
    key: &str,
    rule: &RateLimitRule,
) -> Result<(), ApiError> {
    if limiter.check(key, rule.limit, rule.window()) {
        return Ok(());
    }
    logger::log_warn(&format!("Rate limit exceeded for {} (limit {})", key, rule.limit));
    Err(ApiError::new(ErrorCode::RateLimitExceeded))
}

pub fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("text/event-stream"))
        .unwrap_or(false)
}

pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Buffers at most `limit` bytes and decodes them as JSON.
pub async fn read_json_body<T: DeserializeOwned>(body: Body, limit: usize) -> Result<T, ApiError> {
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return Err(ApiError::with_detail(
                ErrorCode::PayloadTooLarge,
                "Request body too large",
            ));
        }
        Err(e) => {
            tracing::warn!("Failed to read request body: {}", e);
            return Err(ApiError::invalid_request("Request body parse failed"));
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!("Rejected request body: {}", e);
        ApiError::invalid_request(e.to_string())
    })
}
