pub mod activity;
pub mod boot;
pub mod config;
pub mod cycle;
pub mod error;
pub mod hal;
pub mod indicator;
pub mod schedule;
pub mod types;
pub mod weather;

#[cfg(test)]
mod test_support;

pub use activity::{ActivityController, ActivityReport};
pub use boot::{BootCheck, BootDecision, BootOrchestrator, BootState, ResyncReason, SyncOutcome};
pub use config::{
    ActivityWindow, FetchConfig, HeartbeatConfig, IndicatorPins, NetworkConfig, RuntimeConfig,
    TimeSyncConfig, WeatherEndpoint,
};
pub use cycle::{Board, WakeCycle};
pub use error::{ClockError, ConfigError, FetchError, IndicatorError, PersistenceError};
pub use hal::{BootStore, Delay, Network, OutputChannel, Socket, ThreadDelay, TimeSource};
pub use indicator::{Heartbeat, IndicatorCommand, IndicatorDriver};
pub use schedule::{should_enter_activity, time_until_window};
pub use types::{LinkState, SleepPlan, SleepReason, WallClock};
pub use weather::{WeatherClassification, WeatherFetcher};
