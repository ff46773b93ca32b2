use std::{
    net::{SocketAddr, TcpStream},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    sntp::{EspSntp, SyncStatus},
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};

use rainlight_common::{
    config::NetworkConfig,
    hal::{connect_tcp, resolve_ipv4_first},
    Board, BootStore, ClockError, FetchError, IndicatorDriver, IndicatorError, LinkState, Network,
    OutputChannel, PersistenceError, SleepPlan, ThreadDelay, TimeSource, WakeCycle, WallClock,
};

use crate::{clock::ZonedClock, settings};

const WIFI_CONNECT_ATTEMPTS: u32 = 3;
const WIFI_RETRY_DELAY_MS: u64 = 1_000;

/// Retained in RTC slow memory across deep sleep; zeroed on power-on reset.
#[link_section = ".rtc.data.boot_state"]
static BOOT_COUNTER: AtomicU32 = AtomicU32::new(0);

type SharedLink = Arc<Mutex<StationLink>>;

struct StationLink {
    wifi: BlockingWifi<EspWifi<'static>>,
    configured: bool,
}

impl StationLink {
    fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs_partition: EspDefaultNvsPartition,
        network: &NetworkConfig,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

        if network.wifi_ssid.trim().is_empty() {
            warn!("wifi credentials missing; station link stays down");
            return Ok(Self {
                wifi,
                configured: false,
            });
        }

        let auth_method = if network.wifi_pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: network
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("wifi ssid too long"))?,
            password: network
                .wifi_pass
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("wifi password too long"))?,
            auth_method,
            ..Default::default()
        }))?;

        Ok(Self {
            wifi,
            configured: true,
        })
    }

    fn bring_up(&mut self) -> LinkState {
        if !self.configured {
            return LinkState::Disconnected;
        }
        if matches!(self.wifi.is_up(), Ok(true)) {
            return LinkState::Connected;
        }

        if !matches!(self.wifi.is_started(), Ok(true)) {
            if let Err(err) = self.wifi.start() {
                warn!("wifi start failed: {err:#}");
                return LinkState::Disconnected;
            }
            info!("wifi started");
        }

        for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
            info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
            match self.wifi.connect() {
                Ok(()) => match self.wifi.wait_netif_up() {
                    Ok(()) => {
                        info!("wifi connected and netif up on attempt {attempt}");
                        return LinkState::Connected;
                    }
                    Err(err) => warn!("wifi netif up failed on attempt {attempt}: {err:#}"),
                },
                Err(err) => warn!("wifi connect failed on attempt {attempt}: {err:#}"),
            }

            if attempt < WIFI_CONNECT_ATTEMPTS {
                let _ = self.wifi.disconnect();
                thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
            }
        }

        warn!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed");
        match self.wifi.is_connected() {
            Ok(true) => LinkState::Connecting,
            _ => LinkState::Disconnected,
        }
    }

    fn shut_down(&mut self) {
        if !matches!(self.wifi.is_started(), Ok(true)) {
            return;
        }
        let _ = self.wifi.disconnect();
        if let Err(err) = self.wifi.stop() {
            warn!("failed to stop wifi before sleep: {err:#}");
        }
    }
}

fn bring_up_shared(link: &SharedLink) -> LinkState {
    match link.lock() {
        Ok(mut link) => link.bring_up(),
        Err(_) => {
            warn!("wifi link lock poisoned");
            LinkState::Disconnected
        }
    }
}

struct EspNetwork {
    link: SharedLink,
}

impl Network for EspNetwork {
    type Socket = TcpStream;

    fn bring_up(&mut self) -> Result<LinkState, FetchError> {
        Ok(bring_up_shared(&self.link))
    }

    fn resolve(&mut self, host: &str, port: u16) -> Result<SocketAddr, FetchError> {
        resolve_ipv4_first(host, port)
    }

    fn connect(&mut self, addr: SocketAddr) -> Result<TcpStream, FetchError> {
        connect_tcp(addr)
    }
}

/// System time set by SNTP, read through the configured timezone. The SNTP
/// client starts on the first sync round and keeps running until sleep.
struct SntpClock {
    zone: ZonedClock,
    link: SharedLink,
    sntp: Option<EspSntp<'static>>,
}

impl SntpClock {
    fn new(link: SharedLink) -> Self {
        Self {
            zone: ZonedClock::default(),
            link,
            sntp: None,
        }
    }
}

impl TimeSource for SntpClock {
    fn now(&self) -> WallClock {
        self.zone.now()
    }

    fn synchronize(&mut self) -> Result<(), ClockError> {
        let sntp = match self.sntp.take() {
            Some(sntp) => sntp,
            None => {
                if bring_up_shared(&self.link) != LinkState::Connected {
                    return Err(ClockError::LinkUnavailable);
                }
                let sntp = EspSntp::new_default()
                    .map_err(|err| ClockError::Backend(format!("failed to start SNTP: {err}")))?;
                info!("SNTP initialized");
                sntp
            }
        };

        let status = sntp.get_sync_status();
        self.sntp = Some(sntp);
        match status {
            SyncStatus::Completed => Ok(()),
            _ => Err(ClockError::Pending),
        }
    }

    fn set_timezone(&mut self, timezone: &str) -> Result<(), ClockError> {
        self.zone.set_timezone(timezone)
    }
}

struct RtcBootStore;

impl BootStore for RtcBootStore {
    fn load(&mut self) -> Result<u32, PersistenceError> {
        Ok(BOOT_COUNTER.load(Ordering::Relaxed))
    }

    fn store(&mut self, counter: u32) -> Result<(), PersistenceError> {
        BOOT_COUNTER.store(counter, Ordering::Relaxed);
        Ok(())
    }
}

struct GpioChannel {
    name: &'static str,
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl OutputChannel for GpioChannel {
    fn set_level(&mut self, high: bool) -> Result<(), IndicatorError> {
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };

        result.map_err(|err| IndicatorError {
            channel: self.name,
            message: err.to_string(),
        })
    }
}

fn gpio_channel(name: &'static str, gpio: i32) -> anyhow::Result<GpioChannel> {
    let pin = unsafe { PinDriver::output(AnyOutputPin::new(gpio)) }
        .with_context(|| format!("failed to claim GPIO{gpio} for the {name} output"))?;
    Ok(GpioChannel { name, pin })
}

fn deep_sleep(plan: SleepPlan) -> ! {
    let micros = u64::try_from(plan.duration.as_micros()).unwrap_or(u64::MAX);
    unsafe { esp_idf_svc::sys::esp_deep_sleep(micros) }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let config = settings::load().context("invalid build-time configuration")?;

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals { modem, .. } = Peripherals::take()?;

    let link: SharedLink = Arc::new(Mutex::new(
        StationLink::new(modem, sys_loop, nvs_partition, &config.network)
            .context("wifi startup failed")?,
    ));

    let pins = config.pins;
    let board = Board {
        clock: SntpClock::new(link.clone()),
        store: RtcBootStore,
        network: EspNetwork { link: link.clone() },
        indicator: IndicatorDriver::new(
            gpio_channel("red", pins.red)?,
            gpio_channel("green", pins.green)?,
            gpio_channel("blue", pins.blue)?,
        ),
        blink: gpio_channel("blink", pins.blink)?,
        delay: ThreadDelay,
    };

    let mut cycle = WakeCycle::new(config, board);
    let plan = cycle.wake();
    drop(cycle);

    match link.lock() {
        Ok(mut link) => link.shut_down(),
        Err(_) => warn!("wifi link lock poisoned; sleeping without shutdown"),
    }

    deep_sleep(plan)
}
