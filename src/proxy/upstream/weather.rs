use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::proxy::mappers::request::Language;
use crate::proxy::config::WeatherConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherInfo {
    /// Rounded to whole degrees Celsius.
    pub temp: i64,
    pub description: &'static str,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: Option<f64>,
    weather_code: Option<i64>,
}

pub fn coordinates_in_range(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Maps a WMO weather interpretation code to a short description.
pub fn describe_weather_code(code: i64, language: Language) -> &'static str {
    let (zh, en) = match code {
        0 => ("晴天", "Clear"),
        1..=3 => ("多云", "Cloudy"),
        45..=48 => ("雾", "Fog"),
        51..=67 => ("雨", "Rain"),
        71..=77 => ("雪", "Snow"),
        80..=82 => ("阵雨", "Showers"),
        95..=99 => ("雷暴", "Thunderstorm"),
        _ => ("未知", "Unknown"),
    };
    match language {
        Language::Zh => zh,
        Language::En => en,
    }
}

/// Best-effort current-conditions lookup. Every failure is swallowed.
#[derive(Clone)]
pub struct WeatherClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(http: Client, config: &WeatherConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
        }
    }

    pub async fn current(&self, lat: f64, lng: f64, language: Language) -> Option<WeatherInfo> {
        if !coordinates_in_range(lat, lng) {
            tracing::debug!(lat, lng, "Skipping weather lookup for out-of-range coordinates");
            return None;
        }
        match tokio::time::timeout(self.timeout, self.fetch(lat, lng)).await {
            Ok(Ok(current)) => {
                let temp = current.temperature_2m?.round() as i64;
                let code = current.weather_code.unwrap_or(-1);
                Some(WeatherInfo {
                    temp,
                    description: describe_weather_code(code, language),
                })
            }
            Ok(Err(e)) => {
                tracing::debug!("Weather lookup failed: {}", e);
                None
            }
            Err(_) => {
                tracing::debug!(timeout_ms = self.timeout.as_millis() as u64, "Weather lookup timed out");
                None
            }
        }
    }

    async fn fetch(&self, lat: f64, lng: f64) -> Result<CurrentConditions, reqwest::Error> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("current", "temperature_2m,weather_code".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: ForecastResponse = response.json().await?;
        Ok(body.current.unwrap_or(CurrentConditions {
            temperature_2m: None,
            weather_code: None,
        }))
    }
}
