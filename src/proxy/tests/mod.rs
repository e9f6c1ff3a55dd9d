// Shared fixtures for router-level and model-client tests: a scripted
// OpenAI-compatible upstream plus a weather endpoint, both on 127.0.0.1:0.


use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tower::ServiceExt;

use crate::proxy::config::GatewayConfig;
use crate::proxy::server::build_app;
use crate::proxy::state::AppState;
use crate::proxy::upstream::sse::{content_frame, DONE_FRAME};

/// How the stub answers a chat-completion call for one model.
#[derive(Debug, Clone)]
pub(crate) enum StubReply {
    Stream(Vec<String>),
    /// First chunk at once, each later chunk after the delay.
    SlowStream(Vec<String>, Duration),
    Status(u16),
    Json(Value),
    Hang,
}

#[derive(Default)]
struct StubInner {
    replies: HashMap<String, StubReply>,
    calls: Vec<Value>,
    weather: Option<Value>,
    weather_calls: usize,
}

#[derive(Clone)]
pub(crate) struct StubUpstream {
    addr: SocketAddr,
    inner: Arc<Mutex<StubInner>>,
}

impl StubUpstream {
    pub(crate) async fn start() -> Self {
        let inner = Arc::new(Mutex::new(StubInner::default()));
        let app = Router::new()
            .route("/chat/completions", post(stub_chat_completions))
            .route("/forecast", get(stub_forecast))
            .with_state(inner.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub upstream");
        let addr = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, inner }
    }

    fn lock(&self) -> MutexGuard<'_, StubInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn weather_url(&self) -> String {
        format!("http://{}/forecast", self.addr)
    }

    pub(crate) fn reply(&self, model: &str, reply: StubReply) -> &Self {
        self.lock().replies.insert(model.to_string(), reply);
        self
    }

    pub(crate) fn weather(&self, body: Value) -> &Self {
        self.lock().weather = Some(body);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Value> {
        self.lock().calls.clone()
    }

    pub(crate) fn models_called(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| call["model"].as_str().map(str::to_string))
            .collect()
    }

    pub(crate) fn weather_calls(&self) -> usize {
        self.lock().weather_calls
    }
}

async fn stub_chat_completions(
    State(inner): State<Arc<Mutex<StubInner>>>,
    Json(body): Json<Value>,
) -> Response {
    let reply = {
        let mut guard = inner.lock().unwrap_or_else(|p| p.into_inner());
        let model = body["model"].as_str().unwrap_or_default().to_string();
        guard.calls.push(body);
        guard.replies.get(&model).cloned()
    };

    match reply {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(StubReply::Stream(chunks)) => sse_body(chunks, None),
        Some(StubReply::SlowStream(chunks, delay)) => sse_body(chunks, Some(delay)),
        Some(StubReply::Status(status)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            format!("{{\"error\":{{\"message\":\"scripted {}\"}}}}", status),
        )
            .into_response(),
        Some(StubReply::Json(value)) => Json(value).into_response(),
        Some(StubReply::Hang) => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn sse_body(chunks: Vec<String>, delay: Option<Duration>) -> Response {
    let stream = async_stream::stream! {
        for (i, chunk) in chunks.into_iter().enumerate() {
            if let (Some(delay), true) = (delay, i > 0) {
                tokio::time::sleep(delay).await;
            }
            yield Ok::<Bytes, Infallible>(Bytes::from(chunk));
        }
    };
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn stub_forecast(State(inner): State<Arc<Mutex<StubInner>>>) -> Response {
    let body = {
        let mut guard = inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.weather_calls += 1;
        guard.weather.clone()
    };
    match body {
        Some(value) => Json(value).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Upstream frames for the given content deltas, closed by `[DONE]`.
pub(crate) fn content_chunks(parts: &[&str]) -> Vec<String> {
    let mut chunks: Vec<String> = parts.iter().map(|part| content_frame(part)).collect();
    chunks.push(DONE_FRAME.to_string());
    chunks
}

pub(crate) fn test_config(stub: &StubUpstream) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = stub.base_url();
    config.upstream.api_key = "test-key".to_string();
    config.weather.base_url = stub.weather_url();
    config
}

pub(crate) fn test_app(config: &GatewayConfig) -> Router {
    build_app(AppState::new(config).expect("build test state"))
}

/// Sends one request through the full middleware stack.
pub(crate) async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

pub(crate) fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("cf-connecting-ip", "203.0.113.7")
        .body(Body::from(body.to_string()))
        .expect("build request")
}
