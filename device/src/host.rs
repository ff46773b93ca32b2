use std::{
    net::{SocketAddr, TcpStream},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use anyhow::Context;
use tracing::{debug, info};

use rainlight_common::{
    hal::{connect_tcp, resolve_ipv4_first},
    Board, BootStore, ClockError, FetchError, IndicatorDriver, IndicatorError, LinkState, Network,
    OutputChannel, PersistenceError, RuntimeConfig, SleepPlan, ThreadDelay, TimeSource, WakeCycle,
    WallClock,
};

use crate::{clock::ZonedClock, settings};

type HostBoard = Board<HostClock, MemoryBootStore, HostNetwork, SimulatedChannel, ThreadDelay>;

/// Host clock is kept by the operating system, so a sync round only has to
/// confirm it.
#[derive(Debug, Default)]
struct HostClock {
    zone: ZonedClock,
}

impl TimeSource for HostClock {
    fn now(&self) -> WallClock {
        self.zone.now()
    }

    fn synchronize(&mut self) -> Result<(), ClockError> {
        Ok(())
    }

    fn set_timezone(&mut self, timezone: &str) -> Result<(), ClockError> {
        self.zone.set_timezone(timezone)
    }
}

/// Stands in for RTC memory: survives the simulated deep sleep, lost when
/// the process exits.
#[derive(Debug, Clone, Default)]
struct MemoryBootStore {
    counter: Arc<AtomicU32>,
}

impl BootStore for MemoryBootStore {
    fn load(&mut self) -> Result<u32, PersistenceError> {
        Ok(self.counter.load(Ordering::Relaxed))
    }

    fn store(&mut self, counter: u32) -> Result<(), PersistenceError> {
        self.counter.store(counter, Ordering::Relaxed);
        Ok(())
    }
}

/// The host network stack is assumed up; failures surface on resolve or
/// connect instead.
#[derive(Debug, Default)]
struct HostNetwork;

impl Network for HostNetwork {
    type Socket = TcpStream;

    fn bring_up(&mut self) -> Result<LinkState, FetchError> {
        Ok(LinkState::Connected)
    }

    fn resolve(&mut self, host: &str, port: u16) -> Result<SocketAddr, FetchError> {
        resolve_ipv4_first(host, port)
    }

    fn connect(&mut self, addr: SocketAddr) -> Result<TcpStream, FetchError> {
        connect_tcp(addr)
    }
}

#[derive(Debug)]
struct SimulatedChannel {
    name: &'static str,
    gpio: i32,
}

impl OutputChannel for SimulatedChannel {
    fn set_level(&mut self, high: bool) -> Result<(), IndicatorError> {
        debug!(
            "gpio{} ({}) -> {}",
            self.gpio,
            self.name,
            if high { "high" } else { "low" }
        );
        Ok(())
    }
}

fn host_board(config: &RuntimeConfig, store: MemoryBootStore) -> HostBoard {
    let pins = &config.pins;
    let channel = |name, gpio| SimulatedChannel { name, gpio };

    Board {
        clock: HostClock::default(),
        store,
        network: HostNetwork,
        indicator: IndicatorDriver::new(
            channel("red", pins.red),
            channel("green", pins.green),
            channel("blue", pins.blue),
        ),
        blink: channel("blink", pins.blink),
        delay: ThreadDelay,
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = settings::load().context("invalid build-time configuration")?;
    if config.endpoint.api_key.is_empty() {
        info!("OPENWEATHER_API_KEY not set at build time; requests will be rejected");
    }

    let store = MemoryBootStore::default();
    info!(
        "rainlight host simulation started, window {:02}:{:02} for {} min ({})",
        config.window.hour, config.window.minute, config.window.duration_minutes, config.timezone
    );

    loop {
        let cycle_config = config.clone();
        let cycle_store = store.clone();
        let plan: SleepPlan = tokio::task::spawn_blocking(move || {
            let board = host_board(&cycle_config, cycle_store);
            WakeCycle::new(cycle_config, board).wake()
        })
        .await
        .context("wake cycle task failed")?;

        info!("simulated deep sleep for {}s", plan.seconds());
        tokio::select! {
            _ = tokio::time::sleep(plan.duration) => {}
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
