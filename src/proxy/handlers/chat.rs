use axum::{
    body::Body,
    extract::{Request, State},
    response::Response,
    Extension,
};

use crate::modules::system::logger::log_info;
use crate::proxy::handlers::common::{current_request_id, enforce_rate_limit, read_json_body};
use crate::proxy::handlers::errors::ApiError;
use crate::proxy::handlers::streaming::build_sse_response;
use crate::proxy::mappers::request::ChatRequest;
use crate::proxy::middleware::ClientIp;
use crate::proxy::pipelines::chat;
use crate::proxy::state::AppState;
use crate::proxy::upstream::client::PassthroughRequest;

/// Always answers `text/event-stream` once the request is accepted; failures
/// after that point arrive as an error frame inside the stream.
pub async fn handle_chat(
    State(state): State<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    request: Request,
) -> Result<Response, ApiError> {
    let ip = client_ip
        .map(|Extension(ip)| ip.0)
        .unwrap_or_else(|| "unknown".to_string());
    enforce_rate_limit(
        &state.core.rate_limiter,
        &format!("chat:{}", ip),
        &state.config.rate_limits.chat,
    )?;

    let body: ChatRequest =
        read_json_body(request.into_body(), state.config.max_body_size).await?;
    let turns = body.messages.len();
    let plan = chat::plan(body, &state.config.models, &state.core.weather).await?;

    let request_id = current_request_id();
    log_info(&format!(
        "Chat streaming: mode={:?} model={} turns={}",
        plan.mode, plan.primary.model, turns
    ));

    let stream = state
        .core
        .models
        .stream_passthrough_with_fallback(PassthroughRequest {
            primary: plan.primary,
            fallback: plan.fallback,
            messages: plan.messages,
            request_id: request_id.clone(),
        });
    Ok(build_sse_response(Body::from_stream(stream), &request_id))
}
