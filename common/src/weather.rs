use core::fmt;
use std::time::Duration;

use log::{info, warn};

use crate::{
    config::{FetchConfig, WeatherEndpoint},
    error::FetchError,
    hal::{Network, Socket},
    types::LinkState,
};

/// Text introducing the primary condition name in the OpenWeatherMap body.
/// The first occurrence is `weather[0].main`; the later `"main":{` object
/// does not match because of the trailing quote.
pub const CONDITION_MARKER: &str = ",\"main\":\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherClassification {
    Rain,
    Cloudy,
    Clear,
    Unknown,
}

impl WeatherClassification {
    pub fn from_condition(token: &str) -> Self {
        match token {
            "Rain" | "Drizzle" | "Thunderstorm" => Self::Rain,
            "Clouds" | "Fog" | "Snow" | "Mist" => Self::Cloudy,
            "Clear" => Self::Clear,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rain => "RAIN",
            Self::Cloudy => "CLOUDY",
            Self::Clear => "CLEAR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for WeatherClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition token after the first marker, up to the next field separator.
/// Exactly one closing quote is stripped; a token that does not end in one
/// (last field, truncated body) is returned as-is and will not classify.
pub fn extract_condition(response: &str) -> Option<&str> {
    let start = response.find(CONDITION_MARKER)? + CONDITION_MARKER.len();
    let rest = &response[start..];
    let field = rest.split(',').next().unwrap_or(rest);

    Some(field.strip_suffix('"').unwrap_or(field))
}

pub fn classify_response(response: &str) -> WeatherClassification {
    match extract_condition(response) {
        Some(token) => WeatherClassification::from_condition(token),
        None => {
            warn!("condition marker missing from response");
            WeatherClassification::Unknown
        }
    }
}

/// Status code from an `HTTP/1.x NNN` status line.
pub fn response_status(response: &str) -> Option<u16> {
    let status_line = response.lines().next()?;
    let mut parts = status_line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Fixed-capacity response storage. Writes past the capacity are rejected
/// instead of truncated.
#[derive(Debug)]
pub struct ResponseBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl ResponseBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn extend(&mut self, chunk: &[u8]) -> Result<(), FetchError> {
        if self.bytes.len() + chunk.len() > self.capacity {
            return Err(FetchError::BufferExceeded {
                capacity: self.capacity,
            });
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Reads until the peer closes. A timeout after some data ends the response
/// (the server may keep the socket open); a timeout before any data fails.
pub fn read_response<S: Socket>(
    socket: &mut S,
    capacity: usize,
    chunk_size: usize,
) -> Result<ResponseBuffer, FetchError> {
    let mut buffer = ResponseBuffer::with_capacity(capacity);
    let mut chunk = vec![0_u8; chunk_size.max(1)];

    loop {
        match socket.recv(&mut chunk) {
            Ok(0) => break,
            Ok(read) => buffer.extend(&chunk[..read])?,
            Err(FetchError::ReceiveTimeout) if !buffer.is_empty() => {
                warn!(
                    "receive timeout after {} bytes; treating as end of response",
                    buffer.len()
                );
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(buffer)
}

pub struct WeatherFetcher<'a, N: Network> {
    network: &'a mut N,
    endpoint: &'a WeatherEndpoint,
    config: &'a FetchConfig,
}

impl<'a, N: Network> WeatherFetcher<'a, N> {
    pub fn new(network: &'a mut N, endpoint: &'a WeatherEndpoint, config: &'a FetchConfig) -> Self {
        Self {
            network,
            endpoint,
            config,
        }
    }

    pub fn fetch_classification(&mut self) -> Result<WeatherClassification, FetchError> {
        let state = self.network.bring_up()?;
        if state != LinkState::Connected {
            return Err(FetchError::LinkUnavailable { state });
        }
        info!("connected to AP");

        let addr = self
            .network
            .resolve(&self.endpoint.host, self.endpoint.port)?;
        info!("dns lookup succeeded, ip={}", addr.ip());

        let mut socket = self.network.connect(addr)?;
        info!("connected to {addr}");

        socket.set_receive_timeout(Duration::from_millis(self.config.receive_timeout_ms))?;
        socket.send(self.endpoint.request().as_bytes())?;
        info!("request sent");

        let response = read_response(
            &mut socket,
            self.config.response_capacity,
            self.config.read_chunk,
        )?;
        let text = response.as_text();
        info!("read {} byte response", response.len());

        match response_status(&text) {
            Some(status) if (200..300).contains(&status) => {}
            Some(status) => warn!("weather endpoint answered HTTP {status}"),
            None => warn!("response has no HTTP status line"),
        }

        let classification = classify_response(&text);
        info!(
            "weather condition {:?} classified as {classification}",
            extract_condition(&text).unwrap_or_default()
        );
        Ok(classification)
    }
}
