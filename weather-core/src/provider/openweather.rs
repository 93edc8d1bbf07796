use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{
    error::FetchError,
    model::{CurrentPayload, ForecastPayload, Locator, UnitSystem},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), api_key, http })
    }

    fn query(&self, locator: &Locator, units: UnitSystem) -> Vec<(&'static str, String)> {
        let mut params = match locator {
            Locator::Name(name) => vec![("q", name.clone())],
            Locator::Coordinates(c) => {
                vec![("lat", c.latitude.to_string()), ("lon", c.longitude.to_string())]
            }
        };
        params.push(("units", units.as_str().to_string()));
        params.push(("appid", self.api_key.clone()));
        params
    }

    #[instrument(level = "debug", skip(self, locator), fields(locator = %locator))]
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        locator: &Locator,
        units: UnitSystem,
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(&self.query(locator, units))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %truncate_body(&body), "OpenWeather request failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch_current(
        &self,
        locator: &Locator,
        units: UnitSystem,
    ) -> Result<CurrentPayload, FetchError> {
        self.get("/weather", locator, units).await
    }

    async fn fetch_forecast(
        &self,
        locator: &Locator,
        units: UnitSystem,
    ) -> Result<ForecastPayload, FetchError> {
        self.get("/forecast", locator, units).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
