use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

pub const CONFIG_PATH_ENV: &str = "SAGE_CONFIG";

/// Loads the config file named by `SAGE_CONFIG` (defaults when unset) and
/// applies environment overrides on top.
pub fn load_app_config() -> AppResult<AppConfig> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => load_app_config_from(Path::new(path.trim()))?,
        _ => AppConfig::new(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn load_app_config_from(path: &Path) -> AppResult<AppConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("failed_to_read_config_file {:?}: {}", path, e))
    })?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn apply_env_overrides(config: &mut AppConfig) {
    let gateway = &mut config.gateway;

    if let Some(key) = env_value("BAILIAN_API_KEY") {
        info!("Using model provider API key from environment");
        gateway.upstream.api_key = key;
    }
    if let Some(url) = env_value("BAILIAN_BASE_URL") {
        info!("Using model provider base URL from environment: {}", url);
        gateway.upstream.base_url = url;
    }
    if let Some(origins) = env_value("ALLOWED_ORIGINS") {
        let parsed: Vec<String> = origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        info!("Using {} allowed origin(s) from environment", parsed.len());
        gateway.cors.allowed_origins = parsed;
    }
    if let Some(host) = env_value("SAGE_HOST") {
        gateway.host = host;
    }
    if let Some(port) = env_value("SAGE_PORT") {
        match port.parse::<u16>() {
            Ok(parsed) => gateway.port = parsed,
            Err(_) => warn!("Ignoring invalid SAGE_PORT value: {}", port),
        }
    }
    if let Some(size) = env_value("SAGE_MAX_BODY_SIZE") {
        match size.parse::<usize>() {
            Ok(parsed) => gateway.max_body_size = parsed,
            Err(_) => warn!("Ignoring invalid SAGE_MAX_BODY_SIZE value: {}", size),
        }
    }
    if let Some(header) = env_value("SAGE_CLIENT_IP_HEADER") {
        gateway.client_ip_header = header.to_ascii_lowercase();
    }
    if let Some(dir) = env_value("SAGE_LOG_DIR") {
        config.logging.log_dir = Some(dir.into());
    }
}
