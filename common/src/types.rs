use core::fmt;
use std::time::Duration;

use chrono::{Datelike, Timelike};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Civil time in the configured timezone, as read from the time source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl WallClock {
    pub fn from_civil<T: Datelike + Timelike>(value: &T) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            second: value.second(),
        }
    }

    /// A clock that was never synchronized reads a year close to the epoch.
    pub fn is_plausible(&self, plausible_year: i32) -> bool {
        self.year >= plausible_year
    }

    pub fn minute_of_day(&self) -> u32 {
        (self.hour % 24) * 60 + self.minute % 60
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepReason {
    /// Short suspension after a resync so the next wake starts with a valid clock.
    Restart,
    /// Woke outside the activity window.
    AwaitWindow,
    /// Activity finished; sleep until tomorrow's window.
    NextWindow,
    /// Link never came up, the indicator phase was skipped.
    ActivitySkipped,
}

impl SleepReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restart => "RESTART",
            Self::AwaitWindow => "AWAIT_WINDOW",
            Self::NextWindow => "NEXT_WINDOW",
            Self::ActivitySkipped => "ACTIVITY_SKIPPED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepPlan {
    pub duration: Duration,
    pub reason: SleepReason,
}

impl SleepPlan {
    pub fn new(duration: Duration, reason: SleepReason) -> Self {
        Self { duration, reason }
    }

    pub fn restart(delay: Duration) -> Self {
        Self::new(delay, SleepReason::Restart)
    }

    pub fn seconds(&self) -> u64 {
        self.duration.as_secs()
    }
}

/// Station link status reported synchronously by the network collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
