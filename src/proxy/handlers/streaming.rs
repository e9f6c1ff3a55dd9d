use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

use crate::constants::REQUEST_ID_HEADER;

pub type BytesResultStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

pub fn build_sse_response(body: Body, request_id: &str) -> Response {
    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no");

    if let Ok(value) = HeaderValue::from_str(request_id) {
        builder = builder.header(REQUEST_ID_HEADER, value);
    }

    builder.body(body).unwrap_or_else(|e| {
        tracing::error!("Failed to build SSE response: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// One named SSE event with a JSON payload.
pub fn sse_event<T: Serialize>(event: &str, payload: &T) -> Bytes {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string());
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

pub fn sse_done_event() -> Bytes {
    Bytes::from_static(b"event: done\ndata: [DONE]\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sse_event_framing() {
        let frame = sse_event("progress", &json!({"stage": "preparing", "progress": 20}));
        assert_eq!(
            frame,
            Bytes::from("event: progress\ndata: {\"progress\":20,\"stage\":\"preparing\"}\n\n")
        );
        assert_eq!(sse_done_event(), Bytes::from("event: done\ndata: [DONE]\n\n"));
    }

    #[test]
    fn test_sse_response_headers() {
        let response = build_sse_response(Body::empty(), "req-9");
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream; charset=utf-8");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers["x-accel-buffering"], "no");
        assert_eq!(headers[REQUEST_ID_HEADER], "req-9");
    }
}
