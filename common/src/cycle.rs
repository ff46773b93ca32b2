use std::time::Duration;

use log::{info, warn};

use crate::{
    activity::ActivityController,
    boot::{BootDecision, BootOrchestrator},
    config::RuntimeConfig,
    hal::{BootStore, Delay, Network, OutputChannel, TimeSource},
    indicator::{Heartbeat, IndicatorDriver},
    schedule::{should_enter_activity, time_until_window},
    types::{SleepPlan, SleepReason},
};

/// Everything a wake cycle drives, as provided by the platform.
pub struct Board<C, S, N, P, D>
where
    C: TimeSource,
    S: BootStore,
    N: Network,
    P: OutputChannel,
    D: Delay,
{
    pub clock: C,
    pub store: S,
    pub network: N,
    pub indicator: IndicatorDriver<P>,
    pub blink: P,
    pub delay: D,
}

pub struct WakeCycle<C, S, N, P, D>
where
    C: TimeSource,
    S: BootStore,
    N: Network,
    P: OutputChannel,
    D: Delay,
{
    config: RuntimeConfig,
    board: Board<C, S, N, P, D>,
}

impl<C, S, N, P, D> WakeCycle<C, S, N, P, D>
where
    C: TimeSource,
    S: BootStore,
    N: Network,
    P: OutputChannel,
    D: Delay,
{
    pub fn new(config: RuntimeConfig, board: Board<C, S, N, P, D>) -> Self {
        Self { config, board }
    }

    pub fn board(&self) -> &Board<C, S, N, P, D> {
        &self.board
    }

    /// Runs one wake cycle and returns how long the platform should suspend.
    pub fn wake(&mut self) -> SleepPlan {
        let plan = self.run();
        info!(
            "going to deep sleep for {}s ({})",
            plan.seconds(),
            plan.reason.as_str()
        );
        plan
    }

    fn run(&mut self) -> SleepPlan {
        let config = &self.config;
        let board = &mut self.board;

        if let Err(err) = board.clock.set_timezone(&config.timezone) {
            warn!("{err:#}; keeping previous timezone");
        }

        let boot = BootOrchestrator::new(&config.time_sync);
        let check = boot.begin_cycle(&mut board.store, &board.clock);

        let now = match check.resync {
            None => check.now,
            Some(reason) => {
                info!("time resync needed: {reason}");
                let heartbeat = Heartbeat::new(Duration::from_millis(config.heartbeat.sync_period_ms))
                    .settle_level(false);
                let clock = &mut board.clock;
                let delay = &mut board.delay;
                let outcome = heartbeat.run(&mut board.blink, || boot.resynchronize(clock, delay));

                match boot.conclude(outcome, &mut board.store) {
                    BootDecision::Restart(plan) => return plan,
                    BootDecision::Proceed { now, degraded } => {
                        if degraded {
                            warn!("scheduling with an unsynchronized clock");
                        }
                        now
                    }
                }
            }
        };
        info!("the current date/time is: {now}");

        let window = &config.window;
        if !should_enter_activity(&now, window) {
            return SleepPlan::new(time_until_window(&now, window), SleepReason::AwaitWindow);
        }

        info!("inside activity window");
        let report = ActivityController::new(
            config,
            &mut board.network,
            &mut board.indicator,
            &mut board.blink,
            &mut board.delay,
        )
        .run(&board.clock);

        report.sleep
    }
}
