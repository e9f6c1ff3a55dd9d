use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::fmt;

use crate::modules::system::request_context;

/// Closed set of wire error codes. Status and retryability are fixed per code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    TooManyImages,
    PayloadTooLarge,
    RateLimitExceeded,
    AiTimeout,
    AiUnavailable,
    AiInvalidResponse,
    OriginNotAllowed,
    InternalError,
}

struct ErrorDescriptor {
    status: StatusCode,
    retryable: bool,
    message_en: &'static str,
    message_zh: &'static str,
    suggestion: &'static str,
    suggestion_zh: &'static str,
}

const INVALID_REQUEST: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    retryable: false,
    message_en: "Invalid request",
    message_zh: "请求格式错误",
    suggestion: "Check your input and try again",
    suggestion_zh: "请检查输入后重试",
};

const TOO_MANY_IMAGES: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    retryable: false,
    message_en: "Too many images (max 5)",
    message_zh: "图片过多，最多5张",
    suggestion: "Reduce to 5 images or fewer",
    suggestion_zh: "请减少到5张以内",
};

const PAYLOAD_TOO_LARGE: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::PAYLOAD_TOO_LARGE,
    retryable: false,
    message_en: "Payload too large",
    message_zh: "请求体过大",
    suggestion: "Reduce image count or compress images",
    suggestion_zh: "请减少图片数量或压缩图片",
};

const RATE_LIMIT_EXCEEDED: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::TOO_MANY_REQUESTS,
    retryable: true,
    message_en: "Rate limit exceeded",
    message_zh: "请求过于频繁，请稍后再试",
    suggestion: "Please wait 1 minute",
    suggestion_zh: "请等待1分钟后再试",
};

const AI_TIMEOUT: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::GATEWAY_TIMEOUT,
    retryable: true,
    message_en: "AI response timed out",
    message_zh: "AI 响应超时，请重试",
    suggestion: "Check your connection and retry",
    suggestion_zh: "检查网络后重试",
};

const AI_UNAVAILABLE: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::SERVICE_UNAVAILABLE,
    retryable: true,
    message_en: "AI service unavailable",
    message_zh: "AI 服务暂时不可用",
    suggestion: "Service maintenance, try again later",
    suggestion_zh: "服务维护中，请稍后再试",
};

const AI_INVALID_RESPONSE: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_GATEWAY,
    retryable: true,
    message_en: "AI returned invalid data",
    message_zh: "AI 返回数据格式异常",
    suggestion: "Please retake the menu photo",
    suggestion_zh: "请重新拍摄菜单",
};

const ORIGIN_NOT_ALLOWED: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::FORBIDDEN,
    retryable: false,
    message_en: "Origin not allowed",
    message_zh: "来源域名不在白名单",
    suggestion: "Open the app from the correct URL",
    suggestion_zh: "请从正确的链接打开应用",
};

const INTERNAL_ERROR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    retryable: true,
    message_en: "Internal server error",
    message_zh: "服务器内部错误",
    suggestion: "Try again later or contact support",
    suggestion_zh: "请稍后重试或联系客服",
};

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::InvalidRequest,
        ErrorCode::TooManyImages,
        ErrorCode::PayloadTooLarge,
        ErrorCode::RateLimitExceeded,
        ErrorCode::AiTimeout,
        ErrorCode::AiUnavailable,
        ErrorCode::AiInvalidResponse,
        ErrorCode::OriginNotAllowed,
        ErrorCode::InternalError,
    ];

    fn descriptor(self) -> &'static ErrorDescriptor {
        match self {
            ErrorCode::InvalidRequest => &INVALID_REQUEST,
            ErrorCode::TooManyImages => &TOO_MANY_IMAGES,
            ErrorCode::PayloadTooLarge => &PAYLOAD_TOO_LARGE,
            ErrorCode::RateLimitExceeded => &RATE_LIMIT_EXCEEDED,
            ErrorCode::AiTimeout => &AI_TIMEOUT,
            ErrorCode::AiUnavailable => &AI_UNAVAILABLE,
            ErrorCode::AiInvalidResponse => &AI_INVALID_RESPONSE,
            ErrorCode::OriginNotAllowed => &ORIGIN_NOT_ALLOWED,
            ErrorCode::InternalError => &INTERNAL_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::TooManyImages => "TOO_MANY_IMAGES",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::AiTimeout => "AI_TIMEOUT",
            ErrorCode::AiUnavailable => "AI_UNAVAILABLE",
            ErrorCode::AiInvalidResponse => "AI_INVALID_RESPONSE",
            ErrorCode::OriginNotAllowed => "ORIGIN_NOT_ALLOWED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        self.descriptor().status
    }

    pub fn retryable(self) -> bool {
        self.descriptor().retryable
    }

    pub fn message_en(self) -> &'static str {
        self.descriptor().message_en
    }

    pub fn message_zh(self) -> &'static str {
        self.descriptor().message_zh
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that is rendered to the client as the bilingual error envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    code: ErrorCode,
    detail: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.detail.as_deref().unwrap_or(self.code.message_en());
        write!(f, "{}: {}", self.code, message)
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::with_detail(ErrorCode::InvalidRequest, detail)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn envelope(&self, request_id: &str) -> Value {
        let meta = self.code.descriptor();
        json!({
            "ok": false,
            "error": {
                "code": self.code.as_str(),
                "message": self.detail.as_deref().unwrap_or(meta.message_en),
                "messageZh": meta.message_zh,
                "messageEn": meta.message_en,
                "retryable": meta.retryable,
                "suggestion": meta.suggestion,
                "suggestionZh": meta.suggestion_zh,
            },
            "requestId": request_id,
        })
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        ApiError::new(code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = request_context::current_request_id().unwrap_or_default();
        (self.code.status(), Json(self.envelope(&request_id))).into_response()
    }
}

pub async fn handle_not_found() -> Response {
    ApiError::invalid_request("Route not found").into_response()
}

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// Last-resort mapping for a panic escaping a handler.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(err.as_ref());
    let lowered = message.to_ascii_lowercase();
    let code = if lowered.contains("timeout")
        || lowered.contains("timed out")
        || message.contains("AbortError")
    {
        ErrorCode::AiTimeout
    } else {
        ErrorCode::InternalError
    };
    crate::modules::system::logger::log_error(&format!(
        "Handler panicked, responding {}: {}",
        code, message
    ));
    ApiError::new(code).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_retryability_table() {
        let expected = [
            (ErrorCode::InvalidRequest, 400, false),
            (ErrorCode::TooManyImages, 400, false),
            (ErrorCode::PayloadTooLarge, 413, false),
            (ErrorCode::RateLimitExceeded, 429, true),
            (ErrorCode::AiTimeout, 504, true),
            (ErrorCode::AiUnavailable, 503, true),
            (ErrorCode::AiInvalidResponse, 502, true),
            (ErrorCode::OriginNotAllowed, 403, false),
            (ErrorCode::InternalError, 500, true),
        ];
        for (code, status, retryable) in expected {
            assert_eq!(code.status().as_u16(), status, "{}", code);
            assert_eq!(code.retryable(), retryable, "{}", code);
        }
    }

    #[test]
    fn test_serialized_code_matches_wire_name() {
        for code in ErrorCode::ALL {
            assert_eq!(serde_json::to_value(code).unwrap(), json!(code.as_str()));
        }
    }

    #[test]
    fn test_envelope_shape() {
        let err = ApiError::with_detail(ErrorCode::PayloadTooLarge, "Image exceeds 4 MB");
        let body = err.envelope("req-42");
        assert_eq!(body["ok"], false);
        assert_eq!(body["requestId"], "req-42");
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(body["error"]["message"], "Image exceeds 4 MB");
        assert_eq!(body["error"]["messageEn"], "Payload too large");
        assert_eq!(body["error"]["messageZh"], "请求体过大");
        assert_eq!(body["error"]["retryable"], false);
        assert_eq!(body["error"]["suggestionZh"], "请减少图片数量或压缩图片");
    }

    #[test]
    fn test_message_defaults_to_english() {
        let body = ApiError::new(ErrorCode::AiTimeout).envelope("r");
        assert_eq!(body["error"]["message"], "AI response timed out");
    }

    #[test]
    fn test_panic_classification() {
        let timeout = handle_panic(Box::new("upstream timeout while reading".to_string()));
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        let generic = handle_panic(Box::new("index out of bounds"));
        assert_eq!(generic.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
