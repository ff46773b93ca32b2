const CONFIG_KEYS: &[&str] = &[
    "RAINLIGHT_CONFIG_JSON",
    "WIFI_SSID",
    "WIFI_PASS",
    "RAINLIGHT_WAKE_HOUR",
    "RAINLIGHT_WAKE_MINUTE",
    "RAINLIGHT_AWAKE_MINUTES",
    "RAINLIGHT_TIMEZONE",
    "RAINLIGHT_BLINK_GPIO",
    "RAINLIGHT_RED_GPIO",
    "RAINLIGHT_GREEN_GPIO",
    "RAINLIGHT_BLUE_GPIO",
    "OPENWEATHER_CITY_ID",
    "OPENWEATHER_API_KEY",
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for key in CONFIG_KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    if std::env::var_os("CARGO_FEATURE_ESP32").is_some() {
        embuild::espidf::sysenv::output();
    }
}
