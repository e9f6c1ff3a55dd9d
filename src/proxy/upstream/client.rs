// Client for the OpenAI-compatible chat-completion endpoint (DashScope compatible mode)

use bytes::Bytes;
use futures::StreamExt;
use reqwest::{header, Client, Response};
use serde_json::{json, Value};
use tokio::time::{timeout, timeout_at, Duration, Instant};

use super::fallback::{run_with_fallback, Attempt, FallbackOutcome};
use super::models::ChatMessage;
use super::sse::{content_frame, parse_data_line, SseData, SseLineBuffer, DONE_FRAME};
use crate::error::AppResult;
use crate::proxy::config::UpstreamConfig;
use crate::proxy::handlers::errors::{ApiError, ErrorCode};
use crate::proxy::handlers::streaming::BytesResultStream;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status}")]
    Http { status: u16, body: String },

    #[error("upstream call timed out")]
    Timeout,

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream response malformed: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Timeout)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Only an outright refusal (403) or a server-side failure (5xx) is worth
    /// retrying against a different model.
    pub fn allows_model_fallback(&self) -> bool {
        matches!(self, UpstreamError::Http { status, .. } if *status == 403 || *status >= 500)
    }

    pub fn error_code(&self) -> ErrorCode {
        if self.is_timeout() {
            ErrorCode::AiTimeout
        } else {
            ErrorCode::AiUnavailable
        }
    }

    fn client_detail(&self) -> String {
        match self {
            UpstreamError::Http { status, .. } => format!("Upstream {}", status),
            UpstreamError::Timeout => "Request timed out".to_string(),
            _ => "Upstream stream failed".to_string(),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::InvalidResponse(e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

/// Inputs for a streamed reply that is relayed to the caller as it arrives.
#[derive(Debug, Clone)]
pub struct PassthroughRequest {
    pub primary: Attempt,
    pub fallback: Option<Attempt>,
    pub messages: Vec<ChatMessage>,
    pub request_id: String,
}

#[derive(Clone)]
pub struct ModelClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ModelClient {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let http = Client::builder()
            // Connection settings (reuse connections across sequential model calls)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(crate::constants::USER_AGENT.as_str())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    // enable_thinking must always be false: leaving it on costs an order of
    // magnitude in time-to-first-token.
    fn request_body(model: &str, messages: &[ChatMessage], stream: bool) -> Value {
        json!({
            "model": model,
            "messages": messages,
            "stream": stream,
            "enable_thinking": false,
        })
    }

    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<Response, UpstreamError> {
        let response = self
            .http
            .post(self.completions_url())
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(model, messages, stream))
            .send()
            .await?;
        Ok(response)
    }

    /// Rejects non-2xx responses. The body is read for diagnostics only when
    /// `read_body` is set; otherwise it is dropped unread.
    async fn ensure_success(
        model: &str,
        response: Response,
        read_body: bool,
    ) -> Result<Response, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = if read_body {
            let text = response.text().await.unwrap_or_default();
            text.chars().take(200).collect()
        } else {
            String::new()
        };
        tracing::error!(
            model = %model,
            status = status.as_u16(),
            body = %body,
            "Model API error"
        );
        Err(UpstreamError::Http {
            status: status.as_u16(),
            body,
        })
    }

    /// Streams a completion and returns the concatenated content deltas.
    pub async fn stream_aggregate(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout_after: Duration,
    ) -> Result<String, UpstreamError> {
        let started = std::time::Instant::now();
        let result = timeout(timeout_after, self.aggregate_inner(model, messages))
            .await
            .unwrap_or(Err(UpstreamError::Timeout));
        match &result {
            Ok(text) => tracing::debug!(
                model = %model,
                chars = text.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Aggregated streamed completion"
            ),
            Err(e) => tracing::warn!(
                model = %model,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Streamed completion failed: {}",
                e
            ),
        }
        result
    }

    async fn aggregate_inner(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        let response = self.send(model, messages, true).await?;
        let response = Self::ensure_success(model, response, true).await?;

        let mut body = Box::pin(response.bytes_stream());
        let mut lines = SseLineBuffer::new();
        let mut text = String::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                match parse_data_line(&line) {
                    SseData::Delta(content) => text.push_str(&content),
                    SseData::Done => return Ok(text),
                    SseData::Ignore => {}
                }
            }
        }
        if let Some(line) = lines.finish() {
            if let SseData::Delta(content) = parse_data_line(&line) {
                text.push_str(&content);
            }
        }
        Ok(text)
    }

    /// Non-streaming completion returning `choices[0].message.content`.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout_after: Duration,
    ) -> Result<String, UpstreamError> {
        let call = async {
            let response = self.send(model, messages, false).await?;
            let response = Self::ensure_success(model, response, true).await?;
            let payload: Value = response.json().await?;
            let content = payload
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            Ok::<String, UpstreamError>(content)
        };
        timeout(timeout_after, call)
            .await
            .unwrap_or(Err(UpstreamError::Timeout))
    }

    /// Relays content deltas as minimal SSE frames while they arrive.
    ///
    /// Fallback to `request.fallback` is decided from the primary's status
    /// line alone, so no byte of a failed attempt ever reaches the caller.
    /// Ends with one `[DONE]` frame, or with one error envelope frame if the
    /// call fails; content already relayed is not retracted.
    pub fn stream_passthrough_with_fallback(&self, request: PassthroughRequest) -> BytesResultStream {
        let client = self.clone();
        Box::pin(async_stream::stream! {
            let PassthroughRequest { primary, fallback, messages, request_id } = request;
            let mut attempts = vec![primary];
            if let Some(fallback) = fallback {
                if fallback.model != attempts[0].model {
                    attempts.push(fallback);
                }
            }

            let client_ref = &client;
            let messages_ref = &messages;
            let outcome = run_with_fallback(
                &attempts,
                UpstreamError::allows_model_fallback,
                move |_, attempt| {
                    let model = attempt.model.clone();
                    let deadline = Instant::now() + attempt.timeout;
                    async move {
                        let response = timeout_at(deadline, client_ref.send(&model, messages_ref, true))
                            .await
                            .map_err(|_| UpstreamError::Timeout)??;
                        let response = ModelClient::ensure_success(&model, response, false).await?;
                        Ok::<_, UpstreamError>((response, deadline))
                    }
                },
            )
            .await;

            let (response, deadline) = match outcome {
                FallbackOutcome::Success { value, model, .. } => {
                    tracing::info!(request_id = %request_id, model = %model, "Relaying streamed reply");
                    value
                }
                FallbackOutcome::Exhausted { errors } => {
                    let (code, detail) = match errors.last() {
                        Some((_, e)) => (e.error_code(), e.client_detail()),
                        None => (ErrorCode::AiUnavailable, "No model attempted".to_string()),
                    };
                    yield Ok::<Bytes, String>(error_frame(code, detail, &request_id));
                    return;
                }
            };

            let mut body = Box::pin(response.bytes_stream());
            let mut lines = SseLineBuffer::new();
            let mut upstream_done = false;
            loop {
                match timeout_at(deadline, body.next()).await {
                    Err(_) => {
                        tracing::warn!(request_id = %request_id, "Streamed reply timed out mid-stream");
                        yield Ok(error_frame(ErrorCode::AiTimeout, "Request timed out".to_string(), &request_id));
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        let err = UpstreamError::from(e);
                        tracing::error!(request_id = %request_id, "Streamed reply failed: {}", err);
                        yield Ok(error_frame(err.error_code(), err.client_detail(), &request_id));
                        return;
                    }
                    Ok(Some(Ok(chunk))) => {
                        for line in lines.push(&chunk) {
                            match parse_data_line(&line) {
                                SseData::Delta(content) => yield Ok(Bytes::from(content_frame(&content))),
                                SseData::Done => upstream_done = true,
                                SseData::Ignore => {}
                            }
                        }
                        if upstream_done {
                            break;
                        }
                    }
                }
            }
            if let Some(line) = lines.finish() {
                if let SseData::Delta(content) = parse_data_line(&line) {
                    yield Ok(Bytes::from(content_frame(&content)));
                }
            }
            yield Ok(Bytes::from_static(DONE_FRAME.as_bytes()));
        })
    }
}

fn error_frame(code: ErrorCode, detail: String, request_id: &str) -> Bytes {
    let envelope = ApiError::with_detail(code, detail).envelope(request_id);
    Bytes::from(format!("data: {}\n\n", envelope))
}
