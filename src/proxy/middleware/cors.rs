use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::modules::system::logger::log_warn;
use crate::proxy::config::CorsConfig;
use crate::proxy::handlers::errors::{ApiError, ErrorCode};
use crate::proxy::state::AppState;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const MAX_AGE_SECS: &str = "86400";

/// Origin value to echo back; empty for anything off the allow-list.
fn allowed_origin<'a>(config: &CorsConfig, origin: Option<&'a str>) -> Option<&'a str> {
    origin.filter(|o| config.is_allowed(o))
}

pub(crate) fn apply_cors_headers(headers: &mut HeaderMap, origin: Option<&str>) {
    let value = origin
        .and_then(|o| HeaderValue::from_str(o).ok())
        .unwrap_or_else(|| HeaderValue::from_static(""));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("X-Request-Id"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}

pub async fn cors_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let allowed = allowed_origin(&state.config.cors, origin.as_deref()).map(str::to_string);

    let mut response = if request.method() == Method::OPTIONS {
        if allowed.is_some() {
            StatusCode::NO_CONTENT.into_response()
        } else {
            log_warn(&format!("Rejected preflight from unlisted origin {:?}", origin));
            ApiError::new(ErrorCode::OriginNotAllowed).into_response()
        }
    } else {
        next.run(request).await
    };

    apply_cors_headers(response.headers_mut(), allowed.as_deref());
    response
}
