use crate::{
    WidgetConfig,
    error::FetchError,
    model::{CurrentPayload, ForecastPayload, Locator, UnitSystem},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;

/// Remote weather service returning raw payloads.
///
/// Values are returned in the requested unit system; nothing is converted
/// locally.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_current(
        &self,
        locator: &Locator,
        units: UnitSystem,
    ) -> Result<CurrentPayload, FetchError>;

    async fn fetch_forecast(
        &self,
        locator: &Locator,
        units: UnitSystem,
    ) -> Result<ForecastPayload, FetchError>;
}

/// Construct the OpenWeather client from config.
pub fn provider_from_config(config: &WidgetConfig) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
        anyhow::anyhow!(
            "No OpenWeather API key configured.\n\
             Hint: run `weather-widget configure` and enter your API key."
        )
    })?;

    let client = OpenWeatherClient::new(
        config.api_base_url.clone(),
        api_key.to_owned(),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = WidgetConfig::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No OpenWeather API key configured"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg = WidgetConfig { api_key: Some("  ".into()), ..WidgetConfig::default() };
        assert!(provider_from_config(&cfg).is_err());
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let cfg = WidgetConfig { api_key: Some("KEY".into()), ..WidgetConfig::default() };
        assert!(provider_from_config(&cfg).is_ok());
    }
}
