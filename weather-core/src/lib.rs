//! Core library for the weather widget.
//!
//! This crate defines:
//! - The weather store: view state, fetch orchestration, refresh scheduling
//! - View-model derivation from raw OpenWeather payloads
//! - Error classification into user-facing messages
//! - Collaborators: OpenWeather client, location resolvers, unit preferences
//! - Configuration handling
//!
//! It is used by `weather-widget`, but any host that can drive a tokio
//! runtime can embed the store.

pub mod config;
pub mod error;
pub mod icon;
pub mod location;
pub mod model;
pub mod preference;
pub mod provider;
pub mod store;
pub mod view;

pub use config::{GeolocationConfig, GeolocationMode, WidgetConfig};
pub use error::{FetchError, LocationError, WidgetError, describe_error};
pub use location::{FixedLocation, IpLocation, LocationResolver, NoGeolocation};
pub use model::{Coordinates, CurrentPayload, ForecastPayload, Locator, UnitSystem};
pub use preference::{FilePreferences, MemoryPreferences, UnitPreferenceStore};
pub use provider::{WeatherProvider, openweather::OpenWeatherClient};
pub use store::{
    Collaborators, HostSignals, RequestOutcome, SchedulerState, StoreSettings, Visibility,
    WeatherStore,
};
pub use view::{CurrentConditions, DailyAggregate, ForecastPeriod, ViewState};
