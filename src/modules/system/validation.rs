use crate::constants::MAX_TOTAL_IMAGE_BYTES;
use crate::models::AppConfig;
use crate::proxy::config::{CorsConfig, GatewayConfig, ModelTier, ModelsConfig, RateLimitRule};
use std::fmt;

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
    pub actual_value: Option<String>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual_value {
            Some(val) => write!(f, "  • {}: {} (got: {})", self.field, self.message, val),
            None => write!(f, "  • {}: {}", self.field, self.message),
        }
    }
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: None,
        }
    }

    fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: Some(value.to_string()),
        }
    }
}

/// Reports every invalid field at once rather than stopping at the first.
pub fn validate_app_config(config: &AppConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    validate_gateway_config(&config.gateway, &mut errors);
    if config.logging.max_log_files == 0 {
        errors.push(ConfigError::with_value(
            "logging.max_log_files",
            "must be greater than 0",
            config.logging.max_log_files,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_gateway_config(config: &GatewayConfig, errors: &mut Vec<ConfigError>) {
    if config.port == 0 {
        errors.push(ConfigError::with_value(
            "gateway.port",
            "must be between 1 and 65535",
            config.port,
        ));
    }
    if config.host.trim().is_empty() {
        errors.push(ConfigError::new("gateway.host", "must not be empty"));
    }
    // base64 inflates the image budget by 4/3 before JSON framing.
    let min_body = MAX_TOTAL_IMAGE_BYTES / 3 * 4;
    if config.max_body_size < min_body {
        errors.push(ConfigError::with_value(
            "gateway.max_body_size",
            format!("must be at least {} bytes to carry a full image set", min_body),
            config.max_body_size,
        ));
    }
    if config.client_ip_header.trim().is_empty()
        || axum::http::HeaderName::from_bytes(config.client_ip_header.as_bytes()).is_err()
    {
        errors.push(ConfigError::with_value(
            "gateway.client_ip_header",
            "must be a valid HTTP header name",
            &config.client_ip_header,
        ));
    }

    if config.upstream.api_key.trim().is_empty() {
        errors.push(ConfigError::new(
            "gateway.upstream.api_key",
            "must not be empty (set BAILIAN_API_KEY)",
        ));
    }
    validate_http_url("gateway.upstream.base_url", &config.upstream.base_url, errors);
    validate_http_url("gateway.weather.base_url", &config.weather.base_url, errors);
    if config.weather.timeout_ms == 0 {
        errors.push(ConfigError::with_value(
            "gateway.weather.timeout_ms",
            "must be greater than 0",
            config.weather.timeout_ms,
        ));
    }

    validate_cors_config(&config.cors, errors);
    validate_models_config(&config.models, errors);
    validate_rate_limit("gateway.rate_limits.analyze", &config.rate_limits.analyze, errors);
    validate_rate_limit("gateway.rate_limits.chat", &config.rate_limits.chat, errors);
    validate_rate_limit(
        "gateway.rate_limits.transcribe",
        &config.rate_limits.transcribe,
        errors,
    );
    if config.rate_limits.purge_interval_secs == 0 {
        errors.push(ConfigError::new(
            "gateway.rate_limits.purge_interval_secs",
            "must be greater than 0",
        ));
    }
}

fn validate_http_url(field: &str, url: &str, errors: &mut Vec<ConfigError>) {
    let trimmed = url.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        errors.push(ConfigError::with_value(
            field,
            "must start with http:// or https://",
            url,
        ));
    }
}

fn validate_cors_config(config: &CorsConfig, errors: &mut Vec<ConfigError>) {
    if config.allowed_origins.is_empty() {
        errors.push(ConfigError::new(
            "gateway.cors.allowed_origins",
            "must list at least one origin",
        ));
    }
    for (index, origin) in config.allowed_origins.iter().enumerate() {
        let field = format!("gateway.cors.allowed_origins[{}]", index);
        let Some((scheme, rest)) = origin.split_once("://") else {
            errors.push(ConfigError::with_value(
                field,
                "must be an origin like https://example.com",
                origin,
            ));
            continue;
        };
        if scheme != "http" && scheme != "https" {
            errors.push(ConfigError::with_value(
                field,
                "scheme must be http or https",
                origin,
            ));
        } else if rest.is_empty() || rest.contains('/') {
            errors.push(ConfigError::with_value(
                field,
                "must not contain a path or trailing slash",
                origin,
            ));
        }
    }
}

fn validate_models_config(config: &ModelsConfig, errors: &mut Vec<ConfigError>) {
    let tiers: [(&str, &ModelTier); 5] = [
        ("vision_fast", &config.vision_fast),
        ("vision_accurate", &config.vision_accurate),
        ("chat_fast", &config.chat_fast),
        ("chat_accurate", &config.chat_accurate),
        ("transcribe", &config.transcribe),
    ];
    for (name, tier) in tiers {
        if tier.name.trim().is_empty() {
            errors.push(ConfigError::new(
                format!("gateway.models.{}.name", name),
                "must not be empty",
            ));
        }
        if tier.timeout_ms == 0 {
            errors.push(ConfigError::with_value(
                format!("gateway.models.{}.timeout_ms", name),
                "must be greater than 0",
                tier.timeout_ms,
            ));
        }
    }
    if config.vision_fast.timeout_ms >= config.vision_accurate.timeout_ms {
        errors.push(ConfigError::with_value(
            "gateway.models.vision_fast.timeout_ms",
            "must be shorter than gateway.models.vision_accurate.timeout_ms",
            config.vision_fast.timeout_ms,
        ));
    }
    if config.vision_fast.name == config.vision_accurate.name {
        errors.push(ConfigError::with_value(
            "gateway.models.vision_accurate.name",
            "must differ from the fast vision model",
            &config.vision_accurate.name,
        ));
    }
}

fn validate_rate_limit(field: &str, rule: &RateLimitRule, errors: &mut Vec<ConfigError>) {
    if rule.limit == 0 {
        errors.push(ConfigError::with_value(
            format!("{}.limit", field),
            "must be greater than 0",
            rule.limit,
        ));
    }
    if rule.window_ms == 0 {
        errors.push(ConfigError::with_value(
            format!("{}.window_ms", field),
            "must be greater than 0",
            rule.window_ms,
        ));
    }
}
