//! Configuration baked in at build time.

use rainlight_common::{ConfigError, RuntimeConfig};

const CONFIG_JSON: Option<&str> = option_env!("RAINLIGHT_CONFIG_JSON");

pub fn load() -> Result<RuntimeConfig, ConfigError> {
    resolve(CONFIG_JSON, build_time_override)
}

/// JSON document first, then individual overrides, then sanitizing.
fn resolve<'a>(
    json: Option<&str>,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Result<RuntimeConfig, ConfigError> {
    let mut config = match json.map(str::trim).filter(|json| !json.is_empty()) {
        Some(json) => RuntimeConfig::from_json(json)?,
        None => RuntimeConfig::default(),
    };
    config.apply_overrides(lookup);
    config.sanitize();
    Ok(config)
}

fn build_time_override(key: &str) -> Option<&'static str> {
    match key {
        "WIFI_SSID" => option_env!("WIFI_SSID"),
        "WIFI_PASS" => option_env!("WIFI_PASS"),
        "RAINLIGHT_WAKE_HOUR" => option_env!("RAINLIGHT_WAKE_HOUR"),
        "RAINLIGHT_WAKE_MINUTE" => option_env!("RAINLIGHT_WAKE_MINUTE"),
        "RAINLIGHT_AWAKE_MINUTES" => option_env!("RAINLIGHT_AWAKE_MINUTES"),
        "RAINLIGHT_TIMEZONE" => option_env!("RAINLIGHT_TIMEZONE"),
        "RAINLIGHT_BLINK_GPIO" => option_env!("RAINLIGHT_BLINK_GPIO"),
        "RAINLIGHT_RED_GPIO" => option_env!("RAINLIGHT_RED_GPIO"),
        "RAINLIGHT_GREEN_GPIO" => option_env!("RAINLIGHT_GREEN_GPIO"),
        "RAINLIGHT_BLUE_GPIO" => option_env!("RAINLIGHT_BLUE_GPIO"),
        "OPENWEATHER_CITY_ID" => option_env!("OPENWEATHER_CITY_ID"),
        "OPENWEATHER_API_KEY" => option_env!("OPENWEATHER_API_KEY"),
        _ => None,
    }
}
