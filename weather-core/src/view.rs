//! Display-ready records and the mapping from raw payloads to them.
//!
//! Current conditions always render: missing numbers become `0`. Daily
//! aggregates only render complete days: a day without a single temperature
//! sample is dropped.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    icon::icon_for_code,
    model::{CurrentPayload, ForecastEntry, ForecastPayload, RawCondition, UnitSystem},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub description: String,
    pub icon: String,
    pub humidity: u8,
    pub wind_speed: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
    pub description: String,
    pub icon: String,
}

/// Everything needed to render the widget at one point in time.
///
/// Snapshots are immutable; the store publishes a new one for every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub current: Option<CurrentConditions>,
    pub hourly: Vec<ForecastPeriod>,
    pub daily: Vec<DailyAggregate>,
    pub units: UnitSystem,
    pub location_label: String,
    pub loading: bool,
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl ViewState {
    pub fn initial(location_label: impl Into<String>, units: UnitSystem) -> Self {
        Self {
            current: None,
            hourly: Vec::new(),
            daily: Vec::new(),
            units,
            location_label: location_label.into(),
            loading: false,
            error: None,
            last_refreshed: None,
        }
    }
}

/// Caps applied while deriving forecast sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastLimits {
    pub max_hourly: usize,
    pub max_daily: usize,
}

impl Default for ForecastLimits {
    fn default() -> Self {
        Self { max_hourly: 8, max_daily: 5 }
    }
}

pub fn map_current(raw: &CurrentPayload, prior_label: &str) -> CurrentConditions {
    let main = raw.main.clone().unwrap_or_default();
    let condition = raw.weather.first();

    CurrentConditions {
        city: raw.name.clone().unwrap_or_else(|| prior_label.to_string()),
        country: raw.sys.as_ref().and_then(|s| s.country.clone()).unwrap_or_default(),
        temperature: main.temp.unwrap_or(0.0),
        feels_like: main.feels_like.unwrap_or(0.0),
        description: description_of(condition),
        icon: icon_of(condition),
        humidity: main.humidity.unwrap_or(0),
        wind_speed: raw.wind.as_ref().and_then(|w| w.speed).unwrap_or(0.0),
        observed_at: unix_to_utc(raw.dt.unwrap_or(0)),
    }
}

/// First `max` entries, in payload order. Missing temperatures become `0`.
pub fn map_hourly(raw: &ForecastPayload, max: usize) -> Vec<ForecastPeriod> {
    raw.list
        .iter()
        .take(max)
        .map(|entry| ForecastPeriod {
            time: unix_to_utc(entry.dt.unwrap_or(0)),
            temperature: entry.temperature().unwrap_or(0.0),
            description: description_of(entry.condition()),
            icon: icon_of(entry.condition()),
        })
        .collect()
}

/// Group entries by UTC calendar day in order of first appearance, keep the
/// first `max` days, then drop days without any temperature sample.
pub fn map_daily(raw: &ForecastPayload, max: usize) -> Vec<DailyAggregate> {
    let mut days: Vec<(NaiveDate, Vec<&ForecastEntry>)> = Vec::new();

    for entry in &raw.list {
        // Entries without a timestamp cannot be placed on a day.
        let Some(dt) = entry.dt else { continue };
        let date = unix_to_utc(dt).date_naive();

        match days.iter_mut().find(|(d, _)| *d == date) {
            Some((_, entries)) => entries.push(entry),
            None => days.push((date, vec![entry])),
        }
    }

    days.into_iter().take(max).filter_map(|(date, entries)| aggregate_day(date, &entries)).collect()
}

fn aggregate_day(date: NaiveDate, entries: &[&ForecastEntry]) -> Option<DailyAggregate> {
    let (min_temp, max_temp) = entries
        .iter()
        .filter_map(|e| e.temperature())
        .filter(|t| t.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })?;

    // Midpoint of the day's entries approximates midday conditions.
    let mid = entries[entries.len() / 2];

    Some(DailyAggregate {
        date,
        min_temp,
        max_temp,
        description: description_of(mid.condition()),
        icon: icon_of(mid.condition()),
    })
}

/// `"<city>, <country>"` from the forecast's city block.
pub fn location_label(raw: &ForecastPayload, fallback: &str) -> String {
    let city = raw.city.as_ref();
    let name = city
        .and_then(|c| c.name.as_deref())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(fallback);

    match city.and_then(|c| c.country.as_deref()).filter(|c| !c.trim().is_empty()) {
        Some(country) => format!("{name}, {country}"),
        None => name.to_string(),
    }
}

fn description_of(condition: Option<&RawCondition>) -> String {
    condition.and_then(|c| c.description.clone()).unwrap_or_default()
}

fn icon_of(condition: Option<&RawCondition>) -> String {
    icon_for_code(condition.and_then(|c| c.icon.as_deref())).to_string()
}

fn unix_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}
