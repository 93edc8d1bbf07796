//! The weather store: single owner of the widget's [`ViewState`].
//!
//! [`WeatherStore`] is a handle to a task that owns the state. Operations are
//! sent to that task as messages, network work runs in a [`JoinSet`] owned by
//! the same task, and every change is published as a fresh `Arc<ViewState>`
//! on a `watch` channel. Because only the task writes, no locking is needed
//! around the state.
//!
//! Every fetch-issuing operation takes a sequence number when it is
//! dispatched. All fetches write the same view, so only the most recently
//! issued one may publish; earlier completions are discarded as
//! [`RequestOutcome::Superseded`].

use chrono::Utc;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::{self, JoinError, JoinHandle, JoinSet},
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::WidgetConfig,
    error::{FetchError, INTERRUPTED_MESSAGE, LocationError, WidgetError, describe_error},
    location::{LocationResolver, resolve_within},
    model::{Coordinates, CurrentPayload, ForecastPayload, Locator, UnitSystem},
    preference::UnitPreferenceStore,
    provider::WeatherProvider,
    view::{ForecastLimits, ViewState, location_label, map_current, map_daily, map_hourly},
};

mod scheduler;

pub use scheduler::{HostSignals, SchedulerState, Visibility};
use scheduler::{Scheduler, SchedulerEvent};

/// Injected collaborators.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn WeatherProvider>,
    pub resolver: Arc<dyn LocationResolver>,
    pub preferences: Arc<dyn UnitPreferenceStore>,
}

/// Static behaviour of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub default_location: String,
    pub default_units: UnitSystem,
    pub limits: ForecastLimits,
    pub geolocation_timeout: Duration,
    pub min_refresh_interval: Duration,
    pub auto_refresh_interval: Option<Duration>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&WidgetConfig::default())
    }
}

impl From<&WidgetConfig> for StoreSettings {
    fn from(config: &WidgetConfig) -> Self {
        Self {
            default_location: config.default_location.clone(),
            default_units: config.default_units,
            limits: config.limits(),
            geolocation_timeout: config.geolocation_timeout(),
            min_refresh_interval: config.min_refresh_interval(),
            auto_refresh_interval: config.auto_refresh_interval(),
        }
    }
}

/// How a request ended, from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// New data was published.
    Published,
    /// The request failed; the message was published as the view error.
    Failed(String),
    /// Nothing to do (blank input, unchanged units, throttled refresh).
    Skipped,
    /// A newer request was issued before this one completed.
    Superseded,
    /// The store went away before the request settled.
    Abandoned,
}

type Reply = oneshot::Sender<RequestOutcome>;

#[derive(Debug)]
enum Command {
    LoadByCity { name: String, reply: Reply },
    LoadByGeolocation { reply: Reply },
    Refresh { force: bool, reply: Reply },
    SetUnits { units: UnitSystem, reply: Reply },
    SchedulerState { reply: oneshot::Sender<SchedulerState> },
    Shutdown,
}

/// Handle to a running store. Dropping it stops the store.
#[derive(Debug)]
pub struct WeatherStore {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<Arc<ViewState>>,
    resolver: Arc<dyn LocationResolver>,
    task: JoinHandle<()>,
}

impl WeatherStore {
    /// Start the store on the current tokio runtime.
    ///
    /// Restores the persisted unit system, issues the initial fetch for the
    /// default location and starts the refresh scheduler if `host` allows.
    pub fn spawn(settings: StoreSettings, collaborators: Collaborators, host: HostSignals) -> Self {
        let units = collaborators.preferences.read().unwrap_or(settings.default_units);

        // The first fetch is issued as soon as the task starts.
        let initial = ViewState {
            loading: !settings.default_location.trim().is_empty(),
            ..ViewState::initial(settings.default_location.clone(), units)
        };
        let state = Arc::new(initial);
        let (publisher, view) = watch::channel(state.clone());
        let (commands, inbox) = mpsc::unbounded_channel();

        let scheduler = Scheduler::new(settings.auto_refresh_interval, host);
        info!(units = %units, scheduler = ?scheduler.state(), "starting weather store");

        let resolver = collaborators.resolver.clone();
        let actor = StoreActor {
            settings,
            provider: collaborators.provider,
            resolver: collaborators.resolver,
            preferences: collaborators.preferences,
            state,
            publisher,
            last_query: None,
            last_success: None,
            issued: 0,
            inflight: JoinSet::new(),
            pending: HashMap::new(),
            scheduler,
        };
        let task = tokio::spawn(actor.run(inbox));

        Self { commands, view, resolver, task }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<ViewState> {
        self.view.borrow().clone()
    }

    /// Receiver of every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewState>> {
        self.view.clone()
    }

    /// Wait until no fetch is in flight and return that snapshot.
    pub async fn settled(&self) -> Arc<ViewState> {
        let mut view = self.view.clone();
        match view.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        }
    }

    pub fn can_geolocate(&self) -> bool {
        self.resolver.can_resolve()
    }

    pub async fn load_by_city(&self, name: &str) -> RequestOutcome {
        let name = name.to_string();
        self.request(|reply| Command::LoadByCity { name, reply }).await
    }

    pub async fn load_by_geolocation(&self) -> RequestOutcome {
        self.request(|reply| Command::LoadByGeolocation { reply }).await
    }

    /// Repeat the last query. Unless `force` is set, a refresh within the
    /// minimum interval of the last successful one is skipped.
    pub async fn refresh(&self, force: bool) -> RequestOutcome {
        self.request(|reply| Command::Refresh { force, reply }).await
    }

    pub async fn set_units(&self, units: UnitSystem) -> RequestOutcome {
        self.request(|reply| Command::SetUnits { units, reply }).await
    }

    pub async fn scheduler_state(&self) -> SchedulerState {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::SchedulerState { reply }).is_err() {
            return SchedulerState::Disabled;
        }
        rx.await.unwrap_or(SchedulerState::Disabled)
    }

    /// Stop the timer, detach the visibility signal and abort in-flight
    /// requests.
    pub async fn dispose(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            error!("weather store task failed: {e}");
        }
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> RequestOutcome {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(command(reply)).is_err() {
            return RequestOutcome::Abandoned;
        }
        rx.await.unwrap_or(RequestOutcome::Abandoned)
    }
}

/// Query a bare `refresh` repeats.
#[derive(Debug, Clone, PartialEq)]
enum LastQuery {
    Name(String),
    Coordinates { coordinates: Coordinates, label: String },
}

/// Request a task in the `JoinSet` is working for.
#[derive(Debug)]
struct Pending {
    seq: u64,
    reply: Option<Reply>,
}

#[derive(Debug)]
enum Completion {
    Located(Result<Coordinates, LocationError>),
    Fetched {
        locator: Locator,
        fallback_label: String,
        result: Result<(CurrentPayload, ForecastPayload), FetchError>,
    },
}

struct StoreActor {
    settings: StoreSettings,
    provider: Arc<dyn WeatherProvider>,
    resolver: Arc<dyn LocationResolver>,
    preferences: Arc<dyn UnitPreferenceStore>,
    state: Arc<ViewState>,
    publisher: watch::Sender<Arc<ViewState>>,
    last_query: Option<LastQuery>,
    last_success: Option<Instant>,
    /// Sequence number of the most recently issued request.
    issued: u64,
    inflight: JoinSet<Completion>,
    pending: HashMap<task::Id, Pending>,
    scheduler: Scheduler,
}

impl StoreActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        let default_location = self.settings.default_location.clone();
        self.load_by_city(&default_location, None);

        loop {
            tokio::select! {
                command = inbox.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(joined) = self.inflight.join_next_with_id() => self.complete(joined),
                event = self.scheduler.next() => self.on_schedule(event),
            }
        }

        self.inflight.abort_all();
        info!("weather store stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::LoadByCity { name, reply } => self.load_by_city(&name, Some(reply)),
            Command::LoadByGeolocation { reply } => self.load_by_geolocation(Some(reply)),
            Command::Refresh { force, reply } => self.refresh(force, Some(reply)),
            Command::SetUnits { units, reply } => self.set_units(units, Some(reply)),
            Command::SchedulerState { reply } => {
                let _ = reply.send(self.scheduler.state());
            }
            Command::Shutdown => {}
        }
    }

    fn on_schedule(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Tick => self.refresh(false, None),
            SchedulerEvent::Paused => info!("host hidden; auto-refresh paused"),
            SchedulerEvent::Resumed => {
                info!("host visible; auto-refresh resumed");
                self.refresh(true, None);
            }
        }
    }

    fn load_by_city(&mut self, name: &str, reply: Option<Reply>) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            respond(reply, RequestOutcome::Skipped);
            return;
        }

        let seq = self.next_seq();
        self.issue_fetch(seq, Locator::Name(trimmed.to_string()), trimmed.to_string(), reply);
    }

    fn load_by_geolocation(&mut self, reply: Option<Reply>) {
        // Numbered before resolving so a search issued meanwhile wins.
        let seq = self.next_seq();
        let resolver = self.resolver.clone();
        let timeout = self.settings.geolocation_timeout;

        debug!(seq, "resolving location");
        self.track(seq, reply, async move {
            Completion::Located(resolve_within(resolver.as_ref(), timeout).await)
        });
    }

    fn refresh(&mut self, force: bool, reply: Option<Reply>) {
        let min = self.settings.min_refresh_interval;
        if !force && self.last_success.is_some_and(|at| at.elapsed() < min) {
            debug!("refresh skipped: within minimum interval");
            respond(reply, RequestOutcome::Skipped);
            return;
        }

        match self.last_query.clone() {
            None => {
                let default_location = self.settings.default_location.clone();
                self.load_by_city(&default_location, reply);
            }
            Some(LastQuery::Name(name)) => self.load_by_city(&name, reply),
            Some(LastQuery::Coordinates { coordinates, label }) => {
                let seq = self.next_seq();
                self.issue_fetch(seq, Locator::Coordinates(coordinates), label, reply);
            }
        }
    }

    fn set_units(&mut self, units: UnitSystem, reply: Option<Reply>) {
        if units == self.state.units {
            respond(reply, RequestOutcome::Skipped);
            return;
        }

        info!(%units, "unit system changed");
        self.publish(|s| s.units = units);
        // Written inline so quick toggles land in order.
        self.preferences.write(units);
        self.refresh(true, reply);
    }

    fn next_seq(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn issue_fetch(
        &mut self,
        seq: u64,
        locator: Locator,
        fallback_label: String,
        reply: Option<Reply>,
    ) {
        self.publish(|s| {
            s.loading = true;
            s.error = None;
        });

        let provider = self.provider.clone();
        let units = self.state.units;
        debug!(seq, %locator, %units, "fetching weather");

        self.track(seq, reply, async move {
            let result = tokio::try_join!(
                provider.fetch_current(&locator, units),
                provider.fetch_forecast(&locator, units),
            );
            Completion::Fetched { locator, fallback_label, result }
        });
    }

    fn track(
        &mut self,
        seq: u64,
        reply: Option<Reply>,
        work: impl Future<Output = Completion> + Send + 'static,
    ) {
        let handle = self.inflight.spawn(work);
        self.pending.insert(handle.id(), Pending { seq, reply });
    }

    fn complete(&mut self, joined: Result<(task::Id, Completion), JoinError>) {
        let (id, joined) = match joined {
            Ok((id, completion)) => (id, Ok(completion)),
            Err(e) => (e.id(), Err(e)),
        };
        let Some(Pending { seq, reply }) = self.pending.remove(&id) else {
            return;
        };

        if seq != self.issued {
            debug!(seq, latest = self.issued, "discarding stale completion");
            respond(reply, RequestOutcome::Superseded);
            return;
        }

        let completion = match joined {
            Ok(completion) => completion,
            Err(e) => {
                error!(seq, "weather request task failed: {e}");
                self.fail(WidgetError::Other(INTERRUPTED_MESSAGE.to_string()), reply);
                return;
            }
        };

        match completion {
            Completion::Located(Ok(coordinates)) => {
                let label = self.state.location_label.clone();
                // A refresh after a failed coordinate fetch retries the coordinates.
                self.last_query = Some(LastQuery::Coordinates { coordinates, label: label.clone() });
                self.issue_fetch(seq, Locator::Coordinates(coordinates), label, reply);
            }
            Completion::Located(Err(e)) => self.fail(e.into(), reply),
            Completion::Fetched { locator, fallback_label, result: Ok((current, forecast)) } => {
                self.apply(locator, &fallback_label, &current, &forecast);
                respond(reply, RequestOutcome::Published);
            }
            Completion::Fetched { result: Err(e), .. } => self.fail(e.into(), reply),
        }
    }

    /// Publish a fetched pair. Current and forecast data only change together.
    fn apply(
        &mut self,
        locator: Locator,
        fallback_label: &str,
        current: &CurrentPayload,
        forecast: &ForecastPayload,
    ) {
        let label = location_label(forecast, fallback_label);
        let limits = self.settings.limits;
        let current = map_current(current, &self.state.location_label);
        let hourly = map_hourly(forecast, limits.max_hourly);
        let daily = map_daily(forecast, limits.max_daily);

        self.last_query = Some(match locator {
            Locator::Name(name) => LastQuery::Name(name),
            Locator::Coordinates(coordinates) => {
                LastQuery::Coordinates { coordinates, label: label.clone() }
            }
        });
        self.last_success = Some(Instant::now());

        info!(location = %label, hourly = hourly.len(), daily = daily.len(), "weather updated");
        self.publish(|s| {
            s.current = Some(current);
            s.hourly = hourly;
            s.daily = daily;
            s.location_label = label;
            s.loading = false;
            s.error = None;
            s.last_refreshed = Some(Utc::now());
        });
    }

    /// Publish a failure; displayed data stays as it was.
    fn fail(&mut self, err: WidgetError, reply: Option<Reply>) {
        let message = describe_error(&err);
        warn!(error = %err, "weather request failed");

        self.publish(|s| {
            s.loading = false;
            s.error = Some(message.clone());
        });
        respond(reply, RequestOutcome::Failed(message));
    }

    fn publish(&mut self, update: impl FnOnce(&mut ViewState)) {
        let mut next = ViewState::clone(&self.state);
        update(&mut next);
        self.state = Arc::new(next);
        self.publisher.send_replace(self.state.clone());
    }
}

fn respond(reply: Option<Reply>, outcome: RequestOutcome) {
    if let Some(reply) = reply {
        // The caller may have stopped waiting.
        let _ = reply.send(outcome);
    }
}
