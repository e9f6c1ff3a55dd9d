use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::proxy::handlers::common::{current_request_id, enforce_rate_limit, read_json_body};
use crate::proxy::handlers::errors::ApiError;
use crate::proxy::mappers::request::TranscribeRequest;
use crate::proxy::pipelines::transcribe;
use crate::proxy::state::AppState;

// One bucket for every caller: the speech model quota is account-wide.
const TRANSCRIBE_RATE_KEY: &str = "transcribe";

pub async fn handle_transcribe(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    enforce_rate_limit(
        &state.core.rate_limiter,
        TRANSCRIBE_RATE_KEY,
        &state.config.rate_limits.transcribe,
    )?;

    let body: TranscribeRequest =
        read_json_body(request.into_body(), state.config.max_body_size).await?;
    let text = transcribe::run(&state.core.models, &state.config.models.transcribe, body).await?;

    Ok(Json(json!({ "ok": true, "text": text, "requestId": current_request_id() })).into_response())
}
