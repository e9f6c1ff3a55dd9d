use crate::proxy::config::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_filter")]
    pub default_filter: String,
}

fn default_max_log_files() -> usize {
    7
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            max_log_files: default_max_log_files(),
            default_filter: default_filter(),
        }
    }
}
