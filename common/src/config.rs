use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::MINUTES_PER_DAY};

/// Daily interval during which the device stays awake and samples weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityWindow {
    pub hour: u8,
    pub minute: u8,
    #[serde(rename = "durationMinutes")]
    pub duration_minutes: u16,
}

impl Default for ActivityWindow {
    fn default() -> Self {
        Self {
            hour: 7,
            minute: 0,
            duration_minutes: 10,
        }
    }
}

impl ActivityWindow {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hour > 23 {
            return Err(ConfigError::WindowHour(self.hour));
        }
        if self.minute > 59 {
            return Err(ConfigError::WindowMinute(self.minute));
        }
        if self.duration_minutes == 0 || u32::from(self.duration_minutes) >= MINUTES_PER_DAY {
            return Err(ConfigError::WindowDuration(self.duration_minutes));
        }
        Ok(())
    }

    pub fn start_minute_of_day(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }

    /// The indicator stays lit for the whole window.
    pub fn awake_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_minutes) * 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorPins {
    pub blink: i32,
    pub red: i32,
    pub green: i32,
    pub blue: i32,
}

impl Default for IndicatorPins {
    fn default() -> Self {
        Self {
            blink: 2,
            red: 27,
            green: 26,
            blue: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherEndpoint {
    pub host: String,
    pub port: u16,
    #[serde(rename = "cityId")]
    pub city_id: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

impl Default for WeatherEndpoint {
    fn default() -> Self {
        Self {
            host: "api.openweathermap.org".to_string(),
            port: 80,
            city_id: "3110044".to_string(),
            api_key: String::new(),
            user_agent: "esp-idf/1.0 esp32".to_string(),
        }
    }
}

impl WeatherEndpoint {
    pub fn request_path(&self) -> String {
        format!("/data/2.5/weather?id={}&appid={}", self.city_id, self.api_key)
    }

    /// Minimal HTTP/1.0 GET; the server closes the connection after the body.
    pub fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\n\r\n",
            self.request_path(),
            self.host,
            self.user_agent
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSyncConfig {
    pub plausible_year: i32,
    pub max_unsynced_cycles: u32,
    pub sync_attempts: u8,
    pub sync_retry_interval_ms: u64,
    pub restart_delay_ms: u64,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            plausible_year: 2018,
            max_unsynced_cycles: 10,
            sync_attempts: 10,
            sync_retry_interval_ms: 2_000,
            restart_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub receive_timeout_ms: u64,
    pub response_capacity: usize,
    pub read_chunk: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 5_000,
            response_capacity: 4_096,
            read_chunk: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub acquire_period_ms: u64,
    pub sync_period_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            acquire_period_ms: 250,
            sync_period_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub window: ActivityWindow,
    pub pins: IndicatorPins,
    pub endpoint: WeatherEndpoint,
    pub time_sync: TimeSyncConfig,
    pub fetch: FetchConfig,
    pub heartbeat: HeartbeatConfig,
    pub timezone: String,
    pub network: NetworkConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            window: ActivityWindow::default(),
            pins: IndicatorPins::default(),
            endpoint: WeatherEndpoint::default(),
            time_sync: TimeSyncConfig::default(),
            fetch: FetchConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            timezone: "Europe/Madrid".to_string(),
            network: NetworkConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Applies the individual build-time overrides on top of the current values.
    /// Unparseable numbers are logged and ignored.
    pub fn apply_overrides<'a>(&mut self, lookup: impl Fn(&str) -> Option<&'a str>) {
        if let Some(ssid) = lookup("WIFI_SSID") {
            self.network.wifi_ssid = ssid.to_string();
        }
        if let Some(pass) = lookup("WIFI_PASS") {
            self.network.wifi_pass = pass.to_string();
        }
        if let Some(timezone) = lookup("RAINLIGHT_TIMEZONE") {
            self.timezone = timezone.to_string();
        }
        if let Some(city_id) = lookup("OPENWEATHER_CITY_ID") {
            self.endpoint.city_id = city_id.to_string();
        }
        if let Some(api_key) = lookup("OPENWEATHER_API_KEY") {
            self.endpoint.api_key = api_key.to_string();
        }

        override_parsed(&lookup, "RAINLIGHT_WAKE_HOUR", &mut self.window.hour);
        override_parsed(&lookup, "RAINLIGHT_WAKE_MINUTE", &mut self.window.minute);
        override_parsed(
            &lookup,
            "RAINLIGHT_AWAKE_MINUTES",
            &mut self.window.duration_minutes,
        );
        override_parsed(&lookup, "RAINLIGHT_BLINK_GPIO", &mut self.pins.blink);
        override_parsed(&lookup, "RAINLIGHT_RED_GPIO", &mut self.pins.red);
        override_parsed(&lookup, "RAINLIGHT_GREEN_GPIO", &mut self.pins.green);
        override_parsed(&lookup, "RAINLIGHT_BLUE_GPIO", &mut self.pins.blue);
    }

    pub fn sanitize(&mut self) {
        if let Err(err) = self.window.validate() {
            warn!("{err}; using default activity window");
            self.window = ActivityWindow::default();
        }

        let defaults = IndicatorPins::default();
        for (pin, fallback) in [
            (&mut self.pins.blink, defaults.blink),
            (&mut self.pins.red, defaults.red),
            (&mut self.pins.green, defaults.green),
            (&mut self.pins.blue, defaults.blue),
        ] {
            if *pin < 0 {
                *pin = fallback;
            }
        }

        if self.endpoint.port == 0 {
            self.endpoint.port = 80;
        }

        self.time_sync.sync_attempts = self.time_sync.sync_attempts.max(1);
        self.fetch.receive_timeout_ms = self.fetch.receive_timeout_ms.clamp(500, 60_000);
        self.fetch.response_capacity = self.fetch.response_capacity.clamp(256, 65_536);
        self.fetch.read_chunk = self.fetch.read_chunk.clamp(16, self.fetch.response_capacity);
        self.heartbeat.acquire_period_ms = self.heartbeat.acquire_period_ms.clamp(50, 5_000);
        self.heartbeat.sync_period_ms = self.heartbeat.sync_period_ms.clamp(50, 5_000);

        if self.timezone.trim().is_empty() {
            self.timezone = "Europe/Madrid".to_string();
        }
    }
}

fn override_parsed<'a, T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<&'a str>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };

    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!("ignoring unparseable {key}=`{raw}`"),
    }
}
