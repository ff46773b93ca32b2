use std::{io, net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::types::LinkState;

/// Failures of the single weather round trip. None of them are fatal; each
/// carries the pause the caller takes before giving up on this cycle's fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network link unavailable ({state})")]
    LinkUnavailable { state: LinkState },
    #[error("dns lookup failed for `{host}`")]
    Resolution {
        host: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("failed to configure socket")]
    Socket(#[source] io::Error),
    #[error("socket connect to {addr} failed")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("socket send failed")]
    Send(#[source] io::Error),
    #[error("no response before receive timeout")]
    ReceiveTimeout,
    #[error("socket receive failed")]
    Receive(#[source] io::Error),
    #[error("response exceeds {capacity} byte buffer")]
    BufferExceeded { capacity: usize },
}

impl FetchError {
    pub fn backoff(&self) -> Duration {
        match self {
            Self::LinkUnavailable { .. } => Duration::ZERO,
            Self::Resolution { .. } | Self::ReceiveTimeout | Self::Receive(_) => {
                Duration::from_secs(1)
            }
            Self::BufferExceeded { .. } => Duration::from_secs(1),
            Self::Socket(_) | Self::Connect { .. } | Self::Send(_) => Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("time synchronization still pending")]
    Pending,
    #[error("network link unavailable for time sync")]
    LinkUnavailable,
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
    #[error("time source failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
#[error("boot state unavailable: {0}")]
pub struct PersistenceError(pub String);

#[derive(Debug, Error)]
#[error("failed to drive {channel} output: {message}")]
pub struct IndicatorError {
    pub channel: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("activity window hour {0} outside 0..=23")]
    WindowHour(u8),
    #[error("activity window minute {0} outside 0..=59")]
    WindowMinute(u8),
    #[error("activity window duration {0} must be between 1 and 1439 minutes")]
    WindowDuration(u16),
    #[error("invalid config json")]
    Json(#[from] serde_json::Error),
}
