use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, Select, Text};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use weather_widget_core::{
    Collaborators, FilePreferences, HostSignals, RequestOutcome, StoreSettings, UnitPreferenceStore,
    UnitSystem, Visibility, WeatherStore, WidgetConfig, location::resolver_from_config,
    provider::provider_from_config,
};

use crate::render::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-widget", version, about = "Terminal weather widget")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key and widget defaults interactively.
    Configure,

    /// Fetch once and print current conditions and forecast.
    Show {
        /// City to show; the configured default location if absent.
        city: Option<String>,

        /// "metric" or "imperial"; remembered for later runs.
        #[arg(long)]
        units: Option<String>,
    },

    /// Keep the widget running, refreshing on a timer and reading commands from stdin.
    Watch {
        /// City to start with; the configured default location if absent.
        #[arg(long)]
        city: Option<String>,

        /// "metric" or "imperial"; remembered for later runs.
        #[arg(long)]
        units: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, units } => show(city, units).await,
            Command::Watch { city, units } => watch_live(city, units).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = WidgetConfig::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    let location = Text::new("Default location:")
        .with_default(&config.default_location)
        .prompt()
        .context("Failed to read default location")?;
    let cursor = UnitSystem::all().iter().position(|u| *u == config.default_units).unwrap_or(0);
    let units = Select::new("Default units:", UnitSystem::all().to_vec())
        .with_starting_cursor(cursor)
        .prompt()
        .context("Failed to read units")?;

    config.api_key = Some(api_key.trim().to_string());
    config.default_location = location.trim().to_string();
    config.default_units = units;
    config.validate()?;
    config.save()?;

    println!("Saved configuration to {}", WidgetConfig::config_file_path()?.display());
    Ok(())
}

async fn show(city: Option<String>, units: Option<String>) -> Result<()> {
    let store = build_store(city, units, HostSignals::manual())?;
    let state = store.settled().await;
    store.dispose().await;

    print!("{}", render(&state));
    if state.current.is_none() {
        if let Some(error) = &state.error {
            bail!("{error}");
        }
    }
    Ok(())
}

async fn watch_live(city: Option<String>, units: Option<String>) -> Result<()> {
    let (visibility, visibility_rx) = watch::channel(Visibility::Visible);
    let store = build_store(city, units, HostSignals::with_visibility(visibility_rx))?;

    let mut view = store.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            let state = view.borrow_and_update().clone();
            if !state.loading {
                println!("{}", render(&state));
            }
            if view.changed().await.is_err() {
                break;
            }
        }
    });

    eprintln!("Commands: search <city> | geo | units <metric|imperial> | refresh | hide | show | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match Input::parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match input {
            Input::Quit => break,
            Input::Visibility(v) => {
                visibility.send_replace(v);
                continue;
            }
            Input::Geolocate if !store.can_geolocate() => {
                eprintln!("Geolocation is not configured.");
                continue;
            }
            _ => {}
        }

        if let Some(outcome) = perform(&store, input).await {
            tracing::debug!(?outcome, "command finished");
            if outcome == RequestOutcome::Skipped {
                eprintln!("Nothing to do.");
            }
        }
    }

    store.dispose().await;
    let _ = printer.await;
    Ok(())
}

/// Run the store operation behind a typed command.
async fn perform(store: &WeatherStore, input: Input) -> Option<RequestOutcome> {
    let outcome = match input {
        Input::Search(city) => store.load_by_city(&city).await,
        Input::Geolocate => store.load_by_geolocation().await,
        Input::Units(units) => store.set_units(units).await,
        // Typed refreshes honour the minimum interval, like timer ticks.
        Input::Refresh => store.refresh(false).await,
        Input::Visibility(_) | Input::Quit => return None,
    };
    Some(outcome)
}

fn build_store(city: Option<String>, units: Option<String>, host: HostSignals) -> Result<WeatherStore> {
    let config = WidgetConfig::load()?;
    let provider = provider_from_config(&config)?;

    let preferences = Arc::new(FilePreferences::platform_default());
    if let Some(units) = units {
        let units = UnitSystem::try_from(units.as_str())?;
        preferences.write(units);
    }

    let mut settings = StoreSettings::from(&config);
    if let Some(city) = city {
        settings.default_location = city;
    }

    let collaborators = Collaborators {
        provider,
        resolver: resolver_from_config(&config),
        preferences,
    };
    Ok(WeatherStore::spawn(settings, collaborators, host))
}

/// One line typed into `watch`.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Search(String),
    Geolocate,
    Units(UnitSystem),
    Refresh,
    Visibility(Visibility),
    Quit,
}

impl Input {
    fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let input = match word.to_ascii_lowercase().as_str() {
            "search" | "s" => Self::Search(rest.to_string()),
            "geo" => Self::Geolocate,
            "units" | "u" => Self::Units(UnitSystem::try_from(rest)?),
            "refresh" | "r" => Self::Refresh,
            "hide" => Self::Visibility(Visibility::Hidden),
            "show" => Self::Visibility(Visibility::Visible),
            "quit" | "q" | "exit" => Self::Quit,
            other => bail!("Unknown command: {other}"),
        };
        Ok(Some(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use weather_widget_core::{
        CurrentPayload, FetchError, ForecastPayload, Locator, MemoryPreferences, NoGeolocation,
        WeatherProvider,
    };

    #[derive(Debug)]
    struct EmptyProvider;

    #[async_trait]
    impl WeatherProvider for EmptyProvider {
        async fn fetch_current(
            &self,
            _locator: &Locator,
            _units: UnitSystem,
        ) -> Result<CurrentPayload, FetchError> {
            Ok(CurrentPayload::default())
        }

        async fn fetch_forecast(
            &self,
            _locator: &Locator,
            _units: UnitSystem,
        ) -> Result<ForecastPayload, FetchError> {
            Ok(ForecastPayload::default())
        }
    }

    fn store() -> WeatherStore {
        WeatherStore::spawn(
            StoreSettings::default(),
            Collaborators {
                provider: Arc::new(EmptyProvider),
                resolver: Arc::new(NoGeolocation),
                preferences: Arc::new(MemoryPreferences::default()),
            },
            HostSignals::manual(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_command_respects_minimum_interval() {
        let store = store();
        store.settled().await;

        assert_eq!(perform(&store, Input::Refresh).await, Some(RequestOutcome::Skipped));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(perform(&store, Input::Refresh).await, Some(RequestOutcome::Published));

        store.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn host_only_commands_do_not_touch_the_store() {
        let store = store();
        store.settled().await;

        assert_eq!(perform(&store, Input::Visibility(Visibility::Hidden)).await, None);
        assert_eq!(perform(&store, Input::Quit).await, None);

        store.dispose().await;
    }

    #[test]
    fn parses_search_with_spaces() {
        let input = Input::parse("search  New York ").unwrap();
        assert_eq!(input, Some(Input::Search("New York".into())));
    }

    #[test]
    fn blank_search_is_passed_through() {
        // The store treats blank names as a no-op.
        assert_eq!(Input::parse("search").unwrap(), Some(Input::Search(String::new())));
    }

    #[test]
    fn parses_units_and_visibility() {
        assert_eq!(Input::parse("units Imperial").unwrap(), Some(Input::Units(UnitSystem::Imperial)));
        assert_eq!(Input::parse("hide").unwrap(), Some(Input::Visibility(Visibility::Hidden)));
        assert_eq!(Input::parse("q").unwrap(), Some(Input::Quit));
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(Input::parse("units kelvin").is_err());
        assert!(Input::parse("dance").is_err());
        assert_eq!(Input::parse("   ").unwrap(), None);
    }
}
