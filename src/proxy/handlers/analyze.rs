// Menu photo analysis endpoint: JSON or SSE progress transport
use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::mpsc;

use crate::modules::system::request_context::{self, with_request_context};
use crate::proxy::handlers::common::{
    current_request_id, enforce_rate_limit, is_multipart, read_json_body, wants_event_stream,
};
use crate::proxy::handlers::errors::{ApiError, ErrorCode};
use crate::proxy::handlers::streaming::{build_sse_response, sse_done_event, sse_event};
use crate::proxy::mappers::request::{
    AnalyzeRequest, ImageInput, Language, Location, RequestContextInfo,
};
use crate::proxy::middleware::ClientIp;
use crate::proxy::pipelines::analyze::{self, AnalyzeStage, ProgressEvent};
use crate::proxy::state::AppState;

pub async fn handle_analyze(
    State(state): State<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    request: Request,
) -> Result<Response, ApiError> {
    let ip = client_ip
        .map(|Extension(ip)| ip.0)
        .unwrap_or_else(|| "unknown".to_string());
    enforce_rate_limit(
        &state.core.rate_limiter,
        &format!("analyze:{}", ip),
        &state.config.rate_limits.analyze,
    )?;

    let wants_stream = wants_event_stream(request.headers());
    let body = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state).await.map_err(|e| {
            tracing::warn!("Rejected multipart body: {}", e);
            ApiError::invalid_request("Request body parse failed")
        })?;
        read_multipart(multipart).await?
    } else {
        read_json_body::<AnalyzeRequest>(request.into_body(), state.config.max_body_size).await?
    };

    let prepared = analyze::prepare(body)?;
    let request_id = current_request_id();
    tracing::info!(
        request_id = %request_id,
        images = prepared.images.len(),
        stream = wants_stream,
        "Menu analysis requested"
    );

    if !wants_stream {
        let menu = analyze::run(
            &state.core.models,
            &state.config.models,
            prepared,
            |_| {},
        )
        .await?;
        return Ok(Json(json!({ "ok": true, "data": menu, "requestId": request_id })).into_response());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let language = prepared.language;
    let core = state.core.clone();
    let config = state.config.clone();
    let ctx = request_context::try_get().unwrap_or_default();
    let task_request_id = request_id.clone();

    // The pipeline keeps running if the client goes away; sends simply fail.
    tokio::spawn(with_request_context(ctx, async move {
        let _ = tx.send(sse_event(
            "progress",
            &ProgressEvent::new(AnalyzeStage::Uploading, language),
        ));

        let progress_tx = tx.clone();
        let outcome = analyze::run(&core.models, &config.models, prepared, move |event| {
            let _ = progress_tx.send(sse_event("progress", &event));
        })
        .await;

        match outcome {
            Ok(menu) => {
                let _ = tx.send(sse_event(
                    "result",
                    &json!({ "ok": true, "data": menu, "requestId": task_request_id }),
                ));
                let _ = tx.send(sse_event(
                    "progress",
                    &ProgressEvent::new(AnalyzeStage::Completed, language),
                ));
                let _ = tx.send(sse_done_event());
            }
            Err(err) => {
                tracing::warn!(request_id = %task_request_id, "Streamed analysis failed: {}", err);
                let _ = tx.send(sse_event("error", &err.envelope(&task_request_id)));
            }
        }
    }));

    let stream = async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(frame);
        }
    };
    Ok(build_sse_response(Body::from_stream(stream), &request_id))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::with_detail(ErrorCode::PayloadTooLarge, "Request body too large")
    } else {
        tracing::warn!("Failed to read multipart field: {}", e);
        ApiError::invalid_request("Request body parse failed")
    }
}

/// Flattened form fields: `images` files, optional `mimeTypes` in file
/// order, `context_language`, `context_timestamp`, `context_location` JSON.
async fn read_multipart(mut multipart: Multipart) -> Result<AnalyzeRequest, ApiError> {
    let mut files: Vec<(String, Option<String>)> = Vec::new();
    let mut mime_types: Vec<String> = Vec::new();
    let mut language: Option<String> = None;
    let mut timestamp: Option<String> = None;
    let mut location: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                files.push((general_purpose::STANDARD.encode(&bytes), content_type));
            }
            "mimeTypes" => mime_types.push(field.text().await.map_err(multipart_error)?),
            "context_language" => language = Some(field.text().await.map_err(multipart_error)?),
            "context_timestamp" => timestamp = Some(field.text().await.map_err(multipart_error)?),
            "context_location" => location = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let images = files
        .into_iter()
        .enumerate()
        .map(|(i, (data, content_type))| ImageInput {
            data,
            mime_type: mime_types
                .get(i)
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .or(content_type)
                .unwrap_or_else(|| "image/jpeg".to_string()),
        })
        .collect();

    let language = language
        .as_deref()
        .and_then(|l| Language::parse(l.trim()))
        .ok_or_else(|| ApiError::invalid_request("context_language must be zh or en"))?;
    let timestamp = timestamp
        .and_then(|t| t.trim().parse::<i64>().ok())
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let location = match location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(raw) => Some(
            serde_json::from_str::<Location>(raw)
                .map_err(|_| ApiError::invalid_request("context_location is malformed"))?,
        ),
        None => None,
    };

    Ok(AnalyzeRequest {
        images,
        context: RequestContextInfo {
            language,
            timestamp,
            location,
        },
    })
}
