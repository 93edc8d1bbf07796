//! Location resolvers: "where is the device?" with a bounded wait.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::{
    config::{GeolocationMode, WidgetConfig},
    error::LocationError,
    model::Coordinates,
};

pub const IP_API_URL: &str = "http://ip-api.com/json";

#[async_trait]
pub trait LocationResolver: Send + Sync + Debug {
    /// Whether this host can resolve a location at all.
    fn can_resolve(&self) -> bool;

    /// Resolve the current position. Implementations may use `timeout` as a
    /// hint; the store enforces it regardless.
    async fn resolve(&self, timeout: Duration) -> Result<Coordinates, LocationError>;
}

/// Run `resolver` bounded by `timeout`.
pub async fn resolve_within(
    resolver: &dyn LocationResolver,
    timeout: Duration,
) -> Result<Coordinates, LocationError> {
    if !resolver.can_resolve() {
        return Err(LocationError::Unsupported);
    }

    tokio::time::timeout(timeout, resolver.resolve(timeout))
        .await
        .unwrap_or(Err(LocationError::Timeout))
}

/// Host without any geolocation capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

#[async_trait]
impl LocationResolver for NoGeolocation {
    fn can_resolve(&self) -> bool {
        false
    }

    async fn resolve(&self, _timeout: Duration) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Always answers with the configured coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coordinates: Coordinates,
}

impl FixedLocation {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl LocationResolver for FixedLocation {
    fn can_resolve(&self) -> bool {
        true
    }

    async fn resolve(&self, _timeout: Duration) -> Result<Coordinates, LocationError> {
        Ok(self.coordinates)
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

/// Coarse position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpLocation {
    url: String,
    http: Client,
}

impl IpLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: Client::new() }
    }
}

impl Default for IpLocation {
    fn default() -> Self {
        Self::new(IP_API_URL)
    }
}

#[async_trait]
impl LocationResolver for IpLocation {
    fn can_resolve(&self) -> bool {
        true
    }

    async fn resolve(&self, timeout: Duration) -> Result<Coordinates, LocationError> {
        let res = self
            .http
            .get(&self.url)
            .query(&[("fields", "status,message,lat,lon")])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    tracing::debug!("IP location request failed: {}", e);
                    LocationError::PositionUnavailable
                }
            })?;

        if !res.status().is_success() {
            tracing::debug!("IP location lookup returned status {}", res.status());
            return Err(LocationError::PositionUnavailable);
        }

        let body: IpApiResponse = res.json().await.map_err(|e| {
            tracing::debug!("IP location parse error: {}", e);
            LocationError::PositionUnavailable
        })?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(latitude), Some(longitude)) => {
                tracing::info!("Resolved location from IP: {:.2}, {:.2}", latitude, longitude);
                Ok(Coordinates { latitude, longitude })
            }
            _ => {
                tracing::debug!(
                    "IP location lookup failed: {}",
                    body.message.as_deref().unwrap_or("no coordinates")
                );
                Err(LocationError::PositionUnavailable)
            }
        }
    }
}

/// Pick the resolver described by `config.geolocation`.
pub fn resolver_from_config(config: &WidgetConfig) -> Arc<dyn LocationResolver> {
    match (config.geolocation.mode, config.geolocation.fixed_coordinates()) {
        (GeolocationMode::Fixed, Some(coordinates)) => Arc::new(FixedLocation::new(coordinates)),
        (GeolocationMode::Ip, _) => Arc::new(IpLocation::default()),
        _ => Arc::new(NoGeolocation),
    }
}
