//! Background refresh timer that follows host visibility.

use std::time::Duration;
use tokio::{
    sync::watch,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// What the host environment offers the scheduler.
#[derive(Debug, Default)]
pub struct HostSignals {
    /// Whether periodic timers are available at all.
    pub timers: bool,
    /// Visibility changes, if the host reports them.
    pub visibility: Option<watch::Receiver<Visibility>>,
}

impl HostSignals {
    /// No timers: refresh happens only when asked.
    pub fn manual() -> Self {
        Self { timers: false, visibility: None }
    }

    /// Timers that never pause.
    pub fn timers_only() -> Self {
        Self { timers: true, visibility: None }
    }

    pub fn with_visibility(visibility: watch::Receiver<Visibility>) -> Self {
        Self { timers: true, visibility: Some(visibility) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Paused,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchedulerEvent {
    Tick,
    Paused,
    Resumed,
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    period: Option<Duration>,
    timer: Option<Interval>,
    visibility: Option<watch::Receiver<Visibility>>,
}

impl Scheduler {
    pub(crate) fn new(period: Option<Duration>, host: HostSignals) -> Self {
        let Some(period) = period.filter(|_| host.timers) else {
            return Self { period: None, timer: None, visibility: None };
        };

        let mut visibility = host.visibility;
        let hidden = visibility
            .as_mut()
            .is_some_and(|rx| *rx.borrow_and_update() == Visibility::Hidden);

        Self {
            period: Some(period),
            timer: (!hidden).then(|| start_timer(period)),
            visibility,
        }
    }

    pub(crate) fn state(&self) -> SchedulerState {
        match (self.period, &self.timer) {
            (None, _) => SchedulerState::Disabled,
            (Some(_), Some(_)) => SchedulerState::Running,
            (Some(_), None) => SchedulerState::Paused,
        }
    }

    /// Wait for the next thing the store has to react to. Cancel safe.
    pub(crate) async fn next(&mut self) -> SchedulerEvent {
        loop {
            tokio::select! {
                _ = tick(&mut self.timer) => return SchedulerEvent::Tick,
                change = visibility_change(&mut self.visibility) => match change {
                    Some(Visibility::Hidden) if self.pause() => return SchedulerEvent::Paused,
                    Some(Visibility::Visible) if self.resume() => return SchedulerEvent::Resumed,
                    Some(_) => {}
                    // Host dropped its signal; keep the current state.
                    None => self.visibility = None,
                },
            }
        }
    }

    fn pause(&mut self) -> bool {
        self.timer.take().is_some()
    }

    fn resume(&mut self) -> bool {
        match (self.period, &self.timer) {
            (Some(period), None) => {
                self.timer = Some(start_timer(period));
                true
            }
            _ => false,
        }
    }
}

/// First tick lands one full period from now.
fn start_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn visibility_change(rx: &mut Option<watch::Receiver<Visibility>>) -> Option<Visibility> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
