use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Header set by the edge proxy carrying the caller's address.
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_max_body_size() -> usize {
    32 * 1024 * 1024
}

fn default_client_ip_header() -> String {
    "cf-connecting-ip".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
            client_ip_header: default_client_ip_header(),
            cors: CorsConfig::default(),
            upstream: UpstreamConfig::default(),
            models: ModelsConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://sage-next-gen.pages.dev".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:4173".to_string(),
    ]
}

impl CorsConfig {
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// One model and the budget a single call to it is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTier {
    pub name: String,
    pub timeout_ms: u64,
}

impl ModelTier {
    pub fn new(name: &str, timeout_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            timeout_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_vision_fast")]
    pub vision_fast: ModelTier,
    #[serde(default = "default_vision_accurate")]
    pub vision_accurate: ModelTier,
    #[serde(default = "default_chat_fast")]
    pub chat_fast: ModelTier,
    #[serde(default = "default_chat_accurate")]
    pub chat_accurate: ModelTier,
    #[serde(default = "default_transcribe")]
    pub transcribe: ModelTier,
}

fn default_vision_fast() -> ModelTier {
    ModelTier::new("qwen3-vl-flash", 30_000)
}

fn default_vision_accurate() -> ModelTier {
    ModelTier::new("qwen3-vl-plus", 60_000)
}

fn default_chat_fast() -> ModelTier {
    ModelTier::new("qwen3.5-flash", 25_000)
}

fn default_chat_accurate() -> ModelTier {
    ModelTier::new("qwen3.5-plus", 25_000)
}

fn default_transcribe() -> ModelTier {
    ModelTier::new("qwen-omni-turbo", 20_000)
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            vision_fast: default_vision_fast(),
            vision_accurate: default_vision_accurate(),
            chat_fast: default_chat_fast(),
            chat_accurate: default_chat_accurate(),
            transcribe: default_transcribe(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window_ms: u64,
}

impl RateLimitRule {
    pub const fn new(limit: u32, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

const HOUR_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(default = "default_analyze_limit")]
    pub analyze: RateLimitRule,
    #[serde(default = "default_chat_limit")]
    pub chat: RateLimitRule,
    #[serde(default = "default_transcribe_limit")]
    pub transcribe: RateLimitRule,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_analyze_limit() -> RateLimitRule {
    RateLimitRule::new(20, HOUR_MS)
}

fn default_chat_limit() -> RateLimitRule {
    RateLimitRule::new(100, HOUR_MS)
}

fn default_transcribe_limit() -> RateLimitRule {
    RateLimitRule::new(10, 60_000)
}

fn default_purge_interval_secs() -> u64 {
    300
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            analyze: default_analyze_limit(),
            chat: default_chat_limit(),
            transcribe: default_transcribe_limit(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    #[serde(default = "default_weather_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_weather_url() -> String {
    DEFAULT_WEATHER_URL.to_string()
}

fn default_weather_timeout_ms() -> u64 {
    500
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            timeout_ms: default_weather_timeout_ms(),
        }
    }
}
