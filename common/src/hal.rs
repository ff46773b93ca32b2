//! Interfaces to the platform collaborators the wake cycle depends on.
//!
//! Target and host builds provide their own implementations; the socket side
//! is shared because both run on `std::net`.

use std::{
    io::{self, ErrorKind, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use crate::{
    error::{ClockError, FetchError, IndicatorError, PersistenceError},
    types::{LinkState, WallClock},
};

pub trait TimeSource {
    fn now(&self) -> WallClock;

    /// One round of synchronization against the configured time servers.
    fn synchronize(&mut self) -> Result<(), ClockError>;

    fn set_timezone(&mut self, timezone: &str) -> Result<(), ClockError>;
}

/// Boot counter storage that survives deep sleep but not power loss.
pub trait BootStore {
    fn load(&mut self) -> Result<u32, PersistenceError>;
    fn store(&mut self, counter: u32) -> Result<(), PersistenceError>;
}

pub trait Network {
    type Socket: Socket;

    /// Associates the station link if needed and reports where it ended up.
    fn bring_up(&mut self) -> Result<LinkState, FetchError>;
    fn resolve(&mut self, host: &str, port: u16) -> Result<SocketAddr, FetchError>;
    fn connect(&mut self, addr: SocketAddr) -> Result<Self::Socket, FetchError>;
}

pub trait Socket {
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<(), FetchError>;
    fn send(&mut self, bytes: &[u8]) -> Result<(), FetchError>;

    /// `Ok(0)` means the peer closed the connection.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, FetchError>;
}

pub trait OutputChannel: Send {
    fn set_level(&mut self, high: bool) -> Result<(), IndicatorError>;
}

pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl Socket for TcpStream {
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<(), FetchError> {
        self.set_read_timeout(Some(timeout))
            .map_err(FetchError::Socket)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), FetchError> {
        self.write_all(bytes).map_err(FetchError::Send)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
        match self.read(buf) {
            Ok(read) => Ok(read),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(FetchError::ReceiveTimeout)
            }
            Err(err) => Err(FetchError::Receive(err)),
        }
    }
}

/// Resolves through the libc/lwIP resolver, preferring an IPv4 address.
pub fn resolve_ipv4_first(host: &str, port: u16) -> Result<SocketAddr, FetchError> {
    let resolution_error = |source: Option<io::Error>| FetchError::Resolution {
        host: host.to_string(),
        source,
    };

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|err| resolution_error(Some(err)))?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| resolution_error(None))
}

pub fn connect_tcp(addr: SocketAddr) -> Result<TcpStream, FetchError> {
    TcpStream::connect(addr).map_err(|source| FetchError::Connect { addr, source })
}
