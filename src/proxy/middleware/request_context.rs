use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use super::client_ip::{extract_client_ip, ClientIp};
use crate::constants::REQUEST_ID_HEADER;
use crate::modules::system::request_context::{with_request_context, RequestContext};
use crate::proxy::state::AppState;

pub async fn request_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let client_ip = extract_client_ip(&request, &state.config.client_ip_header);
    request
        .extensions_mut()
        .insert(ClientIp(client_ip.clone()));

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let ctx = RequestContext::new(request_id.clone(), client_ip);

    let mut response = with_request_context(ctx, async move { next.run(request).await }).await;

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
