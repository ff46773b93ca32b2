use std::time::Duration;

use log::{info, warn};

use crate::{
    config::RuntimeConfig,
    error::FetchError,
    hal::{Delay, Network, OutputChannel, TimeSource},
    indicator::{Heartbeat, IndicatorCommand, IndicatorDriver},
    schedule::time_until_window,
    types::{SleepPlan, SleepReason},
    weather::{WeatherClassification, WeatherFetcher},
};

#[derive(Debug)]
pub struct ActivityReport {
    /// `None` when the link never came up and the indicator phase was skipped.
    pub classification: Option<WeatherClassification>,
    pub command: Option<IndicatorCommand>,
    pub fetch_error: Option<FetchError>,
    pub sleep: SleepPlan,
}

/// One pass through the activity window: fetch under the fast heartbeat,
/// show the result for the window's duration, then plan tomorrow's wake.
pub struct ActivityController<'a, N, P, D>
where
    N: Network,
    P: OutputChannel,
    D: Delay,
{
    config: &'a RuntimeConfig,
    network: &'a mut N,
    indicator: &'a mut IndicatorDriver<P>,
    blink: &'a mut P,
    delay: &'a mut D,
}

impl<'a, N, P, D> ActivityController<'a, N, P, D>
where
    N: Network,
    P: OutputChannel,
    D: Delay,
{
    pub fn new(
        config: &'a RuntimeConfig,
        network: &'a mut N,
        indicator: &'a mut IndicatorDriver<P>,
        blink: &'a mut P,
        delay: &'a mut D,
    ) -> Self {
        Self {
            config,
            network,
            indicator,
            blink,
            delay,
        }
    }

    pub fn run(&mut self, clock: &impl TimeSource) -> ActivityReport {
        let fetched = self.fetch_with_heartbeat();

        let (classification, fetch_error) = match fetched {
            Ok(classification) => (classification, None),
            Err(err @ FetchError::LinkUnavailable { .. }) => {
                warn!("{err}; skipping indicator until next window");
                self.blink_off();
                let sleep = SleepPlan::new(
                    time_until_window(&clock.now(), &self.config.window),
                    SleepReason::ActivitySkipped,
                );
                return ActivityReport {
                    classification: None,
                    command: None,
                    fetch_error: Some(err),
                    sleep,
                };
            }
            Err(err) => {
                let backoff = err.backoff();
                warn!("weather fetch failed: {err:#}; backing off {backoff:?}");
                self.delay.delay(backoff);
                (WeatherClassification::Unknown, Some(err))
            }
        };

        let command =
            IndicatorCommand::for_classification(classification, self.config.window.awake_duration());
        info!("showing {classification} for {}s", command.hold.as_secs());
        if let Err(err) = self.indicator.drive(&command, &mut *self.delay) {
            warn!("indicator drive incomplete: {err:#}");
        }
        self.blink_off();

        let now = clock.now();
        let sleep = SleepPlan::new(
            time_until_window(&now, &self.config.window),
            SleepReason::NextWindow,
        );

        ActivityReport {
            classification: Some(classification),
            command: Some(command),
            fetch_error,
            sleep,
        }
    }

    fn fetch_with_heartbeat(&mut self) -> Result<WeatherClassification, FetchError> {
        let heartbeat = Heartbeat::new(Duration::from_millis(
            self.config.heartbeat.acquire_period_ms,
        ));
        let network = &mut *self.network;
        let endpoint = &self.config.endpoint;
        let fetch = &self.config.fetch;

        heartbeat.run(&mut *self.blink, || {
            WeatherFetcher::new(network, endpoint, fetch).fetch_classification()
        })
    }

    fn blink_off(&mut self) {
        if let Err(err) = self.blink.set_level(false) {
            warn!("failed to switch heartbeat output off: {err}");
        }
    }
}
