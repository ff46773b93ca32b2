use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread::{self, Thread},
    time::{Duration, Instant},
};

use log::warn;

use crate::{
    error::IndicatorError,
    hal::{Delay, OutputChannel},
    weather::WeatherClassification,
};

const HEARTBEAT_STACK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorCommand {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub hold: Duration,
}

impl IndicatorCommand {
    pub fn for_classification(classification: WeatherClassification, hold: Duration) -> Self {
        let (red, green, blue) = match classification {
            WeatherClassification::Rain => (false, false, true),
            WeatherClassification::Cloudy => (true, true, true),
            WeatherClassification::Clear => (false, true, false),
            WeatherClassification::Unknown => (true, false, false),
        };

        Self {
            red,
            green,
            blue,
            hold,
        }
    }

    pub fn levels(&self) -> (bool, bool, bool) {
        (self.red, self.green, self.blue)
    }
}

pub struct IndicatorDriver<P: OutputChannel> {
    red: P,
    green: P,
    blue: P,
}

impl<P: OutputChannel> IndicatorDriver<P> {
    pub fn new(red: P, green: P, blue: P) -> Self {
        let mut driver = Self { red, green, blue };
        if let Err(err) = driver.all_off() {
            warn!("failed to reset indicator outputs: {err}");
        }
        driver
    }

    /// Lights the command's channels for its hold, then switches everything
    /// off. The revert also runs when a write fails or the hold unwinds.
    pub fn drive(
        &mut self,
        command: &IndicatorCommand,
        delay: &mut impl Delay,
    ) -> Result<(), IndicatorError> {
        let lit = RevertOnDrop {
            driver: self,
            armed: true,
        };
        lit.driver.apply(command)?;
        delay.delay(command.hold);
        lit.finish()
    }

    pub fn all_off(&mut self) -> Result<(), IndicatorError> {
        // Every channel is attempted even if an earlier one fails.
        let red = self.red.set_level(false);
        let green = self.green.set_level(false);
        let blue = self.blue.set_level(false);
        red.and(green).and(blue)
    }

    fn apply(&mut self, command: &IndicatorCommand) -> Result<(), IndicatorError> {
        self.red.set_level(command.red)?;
        self.green.set_level(command.green)?;
        self.blue.set_level(command.blue)
    }
}

struct RevertOnDrop<'a, P: OutputChannel> {
    driver: &'a mut IndicatorDriver<P>,
    armed: bool,
}

impl<P: OutputChannel> RevertOnDrop<'_, P> {
    fn finish(mut self) -> Result<(), IndicatorError> {
        self.armed = false;
        self.driver.all_off()
    }
}

impl<P: OutputChannel> Drop for RevertOnDrop<'_, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.driver.all_off() {
            warn!("failed to switch indicator off: {err}");
        }
    }
}

/// Blinks an output on a scoped thread while a task runs on the caller's
/// thread. The blinker is stopped and joined before `run` returns, so the
/// output is free again afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    half_period: Duration,
    settle_level: bool,
}

impl Heartbeat {
    pub fn new(half_period: Duration) -> Self {
        Self {
            half_period,
            settle_level: true,
        }
    }

    pub fn settle_level(mut self, level: bool) -> Self {
        self.settle_level = level;
        self
    }

    pub fn run<P, F, R>(&self, output: &mut P, task: F) -> R
    where
        P: OutputChannel,
        F: FnOnce() -> R,
    {
        let stop = AtomicBool::new(false);
        let stop = &stop;
        let half_period = self.half_period;
        let settle_level = self.settle_level;

        thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name("heartbeat".into())
                .stack_size(HEARTBEAT_STACK_SIZE)
                .spawn_scoped(scope, move || {
                    blink_until_stopped(output, half_period, stop);
                    if let Err(err) = output.set_level(settle_level) {
                        warn!("failed to settle heartbeat output: {err}");
                    }
                });

            let blinker = match spawned {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!("heartbeat thread unavailable, continuing without it: {err}");
                    None
                }
            };

            // Stops the blinker even if the task unwinds, so the scope's
            // implicit join can finish.
            let stopper = StopOnDrop {
                stop,
                blinker: blinker.as_ref().map(|handle| handle.thread().clone()),
            };
            let result = task();
            drop(stopper);

            if let Some(blinker) = blinker {
                if blinker.join().is_err() {
                    warn!("heartbeat thread panicked");
                }
            }

            result
        })
    }
}

struct StopOnDrop<'a> {
    stop: &'a AtomicBool,
    blinker: Option<Thread>,
}

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(blinker) = &self.blinker {
            blinker.unpark();
        }
    }
}

fn blink_until_stopped<P: OutputChannel>(output: &mut P, half_period: Duration, stop: &AtomicBool) {
    let mut lit = false;

    while !stop.load(Ordering::Acquire) {
        lit = !lit;
        if let Err(err) = output.set_level(lit) {
            warn!("heartbeat write failed: {err}");
        }

        let deadline = Instant::now() + half_period;
        loop {
            if stop.load(Ordering::Acquire) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
}
