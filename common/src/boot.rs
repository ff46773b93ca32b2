use core::fmt;
use std::time::Duration;

use log::{info, warn};

use crate::{
    config::TimeSyncConfig,
    error::PersistenceError,
    hal::{BootStore, Delay, TimeSource},
    types::{SleepPlan, WallClock},
};

/// Wake cycles since the clock was last known to be valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootState {
    pub counter: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    ClockUnset { year: i32 },
    CounterExceeded { counter: u32 },
    StateUnavailable,
}

impl fmt::Display for ResyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockUnset { year } => write!(f, "clock is not set yet (year {year})"),
            Self::CounterExceeded { counter } => {
                write!(f, "{counter} cycles since last time sync")
            }
            Self::StateUnavailable => f.write_str("boot counter unavailable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootCheck {
    /// `None` when the boot store could not be read or written.
    pub state: Option<BootState>,
    pub now: WallClock,
    pub resync: Option<ResyncReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synchronized(WallClock),
    /// Every round failed; carries the best-effort clock reading.
    Degraded(WallClock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDecision {
    Restart(SleepPlan),
    Proceed { now: WallClock, degraded: bool },
}

/// Decides, across deep-sleep restarts, when the wall clock has to be
/// resynchronized before it can be trusted for scheduling.
#[derive(Debug, Clone, Copy)]
pub struct BootOrchestrator<'a> {
    config: &'a TimeSyncConfig,
}

impl<'a> BootOrchestrator<'a> {
    pub fn new(config: &'a TimeSyncConfig) -> Self {
        Self { config }
    }

    /// Counts this wake and reads the clock. Never fails: a broken store
    /// forces a resync instead.
    pub fn begin_cycle(&self, store: &mut impl BootStore, clock: &impl TimeSource) -> BootCheck {
        let state = match increment_counter(store) {
            Ok(counter) => {
                info!("boot count: {counter}");
                Some(BootState { counter })
            }
            Err(err) => {
                warn!("{err:#}; forcing time resync");
                None
            }
        };

        let now = clock.now();
        let resync = match state {
            _ if !now.is_plausible(self.config.plausible_year) => {
                Some(ResyncReason::ClockUnset { year: now.year })
            }
            None => Some(ResyncReason::StateUnavailable),
            Some(BootState { counter }) if counter > self.config.max_unsynced_cycles => {
                Some(ResyncReason::CounterExceeded { counter })
            }
            Some(_) => None,
        };

        BootCheck { state, now, resync }
    }

    pub fn resynchronize(
        &self,
        clock: &mut impl TimeSource,
        delay: &mut impl Delay,
    ) -> SyncOutcome {
        let attempts = self.config.sync_attempts.max(1);
        let interval = Duration::from_millis(self.config.sync_retry_interval_ms);

        for attempt in 1..=attempts {
            match clock.synchronize() {
                Ok(()) => {
                    let now = clock.now();
                    if now.is_plausible(self.config.plausible_year) {
                        info!("time synchronized: {now}");
                        return SyncOutcome::Synchronized(now);
                    }
                    info!("time source answered but clock still reads {now} ({attempt}/{attempts})");
                }
                Err(err) => info!("waiting for system time to be set: {err} ({attempt}/{attempts})"),
            }

            if attempt < attempts {
                delay.delay(interval);
            }
        }

        let now = clock.now();
        warn!("time sync gave up after {attempts} attempts, continuing with {now}");
        SyncOutcome::Degraded(now)
    }

    /// A successful sync resets the counter and asks for a short restart so
    /// the next wake schedules from a clean clock.
    pub fn conclude(&self, outcome: SyncOutcome, store: &mut impl BootStore) -> BootDecision {
        match outcome {
            SyncOutcome::Synchronized(_) => {
                if let Err(err) = store.store(0) {
                    warn!("failed to reset boot counter: {err:#}");
                }
                let plan = SleepPlan::restart(Duration::from_millis(self.config.restart_delay_ms));
                BootDecision::Restart(plan)
            }
            SyncOutcome::Degraded(now) => BootDecision::Proceed {
                now,
                degraded: true,
            },
        }
    }
}

fn increment_counter(store: &mut impl BootStore) -> Result<u32, PersistenceError> {
    let counter = store.load()?.saturating_add(1);
    store.store(counter)?;
    Ok(counter)
}
