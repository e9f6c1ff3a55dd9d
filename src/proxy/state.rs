use std::sync::Arc;
use std::time::Duration;

use crate::constants::USER_AGENT;
use crate::error::AppResult;
use crate::proxy::config::{CorsConfig, GatewayConfig, ModelsConfig, RateLimitsConfig};
use crate::proxy::rate_limit::RateLimiter;
use crate::proxy::upstream::client::ModelClient;
use crate::proxy::upstream::weather::WeatherClient;

#[derive(Clone)]
pub struct CoreServices {
    pub models: ModelClient,
    pub weather: WeatherClient,
    pub rate_limiter: Arc<RateLimiter>,
}

#[derive(Clone)]
pub struct ConfigState {
    pub models: ModelsConfig,
    pub rate_limits: RateLimitsConfig,
    pub cors: CorsConfig,
    pub client_ip_header: String,
    pub max_body_size: usize,
}

// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<CoreServices>,
    pub config: Arc<ConfigState>,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> AppResult<Self> {
        Self::with_rate_limiter(config, Arc::new(RateLimiter::new()))
    }

    pub fn with_rate_limiter(
        config: &GatewayConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> AppResult<Self> {
        let models = ModelClient::new(&config.upstream)?;
        let weather_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_secs))
            .user_agent(USER_AGENT.as_str())
            .build()?;
        let weather = WeatherClient::new(weather_http, &config.weather);

        Ok(Self {
            core: Arc::new(CoreServices {
                models,
                weather,
                rate_limiter,
            }),
            config: Arc::new(ConfigState {
                models: config.models.clone(),
                rate_limits: config.rate_limits.clone(),
                cors: config.cors.clone(),
                client_ip_header: config.client_ip_header.to_ascii_lowercase(),
                max_body_size: config.max_body_size,
            }),
        })
    }
}

impl axum::extract::FromRef<AppState> for Arc<CoreServices> {
    fn from_ref(state: &AppState) -> Self {
        state.core.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ConfigState> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
