//! Plain-text rendering of a view snapshot.

use std::fmt::Write;

use weather_widget_core::ViewState;

pub fn render(state: &ViewState) -> String {
    let mut out = String::new();
    let temp = state.units.temperature_suffix();

    let _ = write!(out, "{}", state.location_label);
    if let Some(at) = state.last_refreshed {
        let _ = write!(out, "  (updated {} UTC)", at.format("%H:%M:%S"));
    }
    if state.loading {
        out.push_str("  [loading]");
    }
    out.push('\n');

    if let Some(current) = &state.current {
        let _ = writeln!(
            out,
            "  {:.1}{temp}  feels like {:.1}{temp}  {}",
            current.temperature, current.feels_like, current.description
        );
        let _ = writeln!(
            out,
            "  humidity {}%  wind {:.1} {}",
            current.humidity,
            current.wind_speed,
            state.units.wind_suffix()
        );
    }

    if !state.hourly.is_empty() {
        let hours: Vec<String> = state
            .hourly
            .iter()
            .map(|p| format!("{} {:.0}{temp}", p.time.format("%H:%M"), p.temperature))
            .collect();
        let _ = writeln!(out, "  hours: {}", hours.join(" | "));
    }

    for day in &state.daily {
        let _ = writeln!(
            out,
            "  {}  {:.0}{temp} / {:.0}{temp}  {}",
            day.date.format("%a %d %b"),
            day.min_temp,
            day.max_temp,
            day.description,
        );
    }

    if let Some(error) = &state.error {
        let _ = writeln!(out, "  ! {error}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use weather_widget_core::{CurrentConditions, DailyAggregate, ForecastPeriod, UnitSystem};

    fn state() -> ViewState {
        ViewState {
            current: Some(CurrentConditions {
                city: "Paris".into(),
                country: "FR".into(),
                temperature: 12.34,
                feels_like: 11.0,
                description: "broken clouds".into(),
                icon: "/icons/Cloud.svg".into(),
                humidity: 81,
                wind_speed: 4.1,
                observed_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            }),
            daily: vec![DailyAggregate {
                date: NaiveDate::from_ymd_opt(2023, 11, 15).unwrap(),
                min_temp: 8.0,
                max_temp: 13.0,
                description: "light rain".into(),
                icon: "/icons/Cloud-Drizzle.svg".into(),
            }],
            last_refreshed: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            ..ViewState::initial("Paris, FR", UnitSystem::Metric)
        }
    }

    #[test]
    fn renders_current_and_daily() {
        let text = render(&state());

        assert!(text.starts_with("Paris, FR  (updated 22:13:20 UTC)"));
        assert!(text.contains("12.3°C  feels like 11.0°C  broken clouds"));
        assert!(text.contains("wind 4.1 m/s"));
        assert!(text.contains("Wed 15 Nov  8°C / 13°C  light rain"));
    }

    #[test]
    fn imperial_uses_fahrenheit_everywhere() {
        let state = ViewState {
            units: UnitSystem::Imperial,
            hourly: vec![ForecastPeriod {
                time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                temperature: 51.0,
                description: "light rain".into(),
                icon: "/icons/Cloud-Drizzle.svg".into(),
            }],
            ..state()
        };
        let text = render(&state);

        assert!(text.contains("12.3°F  feels like 11.0°F"));
        assert!(text.contains("hours: 22:13 51°F"));
        assert!(text.contains("8°F / 13°F"));
        assert!(text.contains("wind 4.1 mph"));
    }

    #[test]
    fn renders_error_and_loading() {
        let state = ViewState {
            loading: true,
            error: Some("Location not found. Try another city name.".into()),
            ..ViewState::initial("Groningen", UnitSystem::Imperial)
        };
        let text = render(&state);

        assert!(text.contains("[loading]"));
        assert!(text.contains("! Location not found."));
    }
}
