use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};

use crate::{
    model::{Coordinates, UnitSystem},
    provider::openweather::DEFAULT_BASE_URL,
    view::ForecastLimits,
};

/// How the widget answers "where am I?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationMode {
    #[default]
    Off,
    /// Use the configured coordinates.
    Fixed,
    /// Ask an IP geolocation service.
    Ip,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default)]
    pub mode: GeolocationMode,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl GeolocationConfig {
    pub fn fixed_coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates { latitude: self.latitude?, longitude: self.longitude? })
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_location = "Paris, FR"
/// default_units = "imperial"
///
/// [geolocation]
/// mode = "fixed"
/// latitude = 48.85
/// longitude = 2.35
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_location")]
    pub default_location: String,

    #[serde(default)]
    pub default_units: UnitSystem,

    #[serde(default = "default_max_hourly")]
    pub max_hourly_periods: usize,

    #[serde(default = "default_max_daily")]
    pub max_daily_periods: usize,

    #[serde(default = "default_geolocation_timeout")]
    pub geolocation_timeout_ms: u64,

    /// Cooldown between non-forced refreshes.
    #[serde(default = "default_min_refresh")]
    pub min_refresh_interval_ms: u64,

    /// Background refresh period; `0` disables the scheduler.
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh_interval_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub geolocation: GeolocationConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_location() -> String {
    "Province of Groningen, NL".to_string()
}

const fn default_max_hourly() -> usize {
    8
}

const fn default_max_daily() -> usize {
    5
}

const fn default_geolocation_timeout() -> u64 {
    8_000
}

const fn default_min_refresh() -> u64 {
    2_000
}

const fn default_auto_refresh() -> u64 {
    60_000
}

const fn default_request_timeout() -> u64 {
    10
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            api_key: None,
            default_location: default_location(),
            default_units: UnitSystem::default(),
            max_hourly_periods: default_max_hourly(),
            max_daily_periods: default_max_daily(),
            geolocation_timeout_ms: default_geolocation_timeout(),
            min_refresh_interval_ms: default_min_refresh(),
            auto_refresh_interval_ms: default_auto_refresh(),
            request_timeout_secs: default_request_timeout(),
            geolocation: GeolocationConfig::default(),
        }
    }
}

impl WidgetConfig {
    pub fn limits(&self) -> ForecastLimits {
        ForecastLimits { max_hourly: self.max_hourly_periods, max_daily: self.max_daily_periods }
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }

    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.min_refresh_interval_ms)
    }

    /// `None` when background refresh is disabled.
    pub fn auto_refresh_interval(&self) -> Option<Duration> {
        (self.auto_refresh_interval_ms > 0)
            .then(|| Duration::from_millis(self.auto_refresh_interval_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_location.trim().is_empty() {
            bail!("default_location must not be empty");
        }
        if self.max_hourly_periods == 0 || self.max_daily_periods == 0 {
            bail!("max_hourly_periods and max_daily_periods must be at least 1");
        }
        if self.auto_refresh_interval_ms > 0
            && self.auto_refresh_interval_ms < self.min_refresh_interval_ms
        {
            bail!(
                "auto_refresh_interval_ms ({}) must be 0 or at least min_refresh_interval_ms ({})",
                self.auto_refresh_interval_ms,
                self.min_refresh_interval_ms
            );
        }
        if self.geolocation.mode == GeolocationMode::Fixed
            && self.geolocation.fixed_coordinates().is_none()
        {
            bail!("geolocation mode \"fixed\" requires both latitude and longitude");
        }
        Ok(())
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: WidgetConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate().with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Where the unit preference file lives.
    pub fn preferences_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("preferences.toml"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-widget", "weather-widget")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_widget_behaviour() {
        let cfg = WidgetConfig::default();

        assert_eq!(cfg.default_units, UnitSystem::Metric);
        assert_eq!(cfg.limits(), ForecastLimits { max_hourly: 8, max_daily: 5 });
        assert_eq!(cfg.min_refresh_interval(), Duration::from_millis(2_000));
        assert_eq!(cfg.auto_refresh_interval(), Some(Duration::from_millis(60_000)));
        assert_eq!(cfg.geolocation_timeout(), Duration::from_millis(8_000));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_auto_refresh_disables_scheduler() {
        let cfg = WidgetConfig { auto_refresh_interval_ms: 0, ..WidgetConfig::default() };
        assert_eq!(cfg.auto_refresh_interval(), None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn auto_refresh_shorter_than_cooldown_is_rejected() {
        let cfg = WidgetConfig {
            auto_refresh_interval_ms: 1_000,
            min_refresh_interval_ms: 2_000,
            ..WidgetConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("auto_refresh_interval_ms"));
    }

    #[test]
    fn fixed_geolocation_requires_coordinates() {
        let mut cfg = WidgetConfig::default();
        cfg.geolocation.mode = GeolocationMode::Fixed;
        cfg.geolocation.latitude = Some(52.1);
        assert!(cfg.validate().is_err());

        cfg.geolocation.longitude = Some(4.3);
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.geolocation.fixed_coordinates(),
            Some(Coordinates { latitude: 52.1, longitude: 4.3 })
        );
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: WidgetConfig = toml::from_str(
            r#"
            api_key = "KEY"
            default_units = "imperial"

            [geolocation]
            mode = "ip"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.api_key.as_deref(), Some("KEY"));
        assert_eq!(cfg.default_units, UnitSystem::Imperial);
        assert_eq!(cfg.geolocation.mode, GeolocationMode::Ip);
        assert_eq!(cfg.max_hourly_periods, 8);
        assert_eq!(cfg.api_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = WidgetConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, WidgetConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = WidgetConfig {
            api_key: Some("KEY".into()),
            default_location: "Paris, FR".into(),
            ..WidgetConfig::default()
        };
        cfg.save_to(&path).unwrap();

        assert_eq!(WidgetConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_daily_periods = 0\n").unwrap();

        let err = WidgetConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
