//! Scripted collaborators for host tests.

use std::{
    collections::VecDeque,
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    error::{ClockError, FetchError, IndicatorError, PersistenceError},
    hal::{BootStore, Delay, Network, OutputChannel, Socket, TimeSource},
    types::{LinkState, WallClock},
};

pub const SAMPLE_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
Server: openresty\r\n\
Content-Type: application/json; charset=utf-8\r\n\
Connection: close\r\n\
\r\n\
{\"coord\":{\"lon\":-0.88,\"lat\":41.65},\"weather\":[{\"id\":500,\"main\":\"Rain\",\
\"description\":\"light rain\",\"icon\":\"10d\"}],\"base\":\"stations\",\
\"main\":{\"temp\":284.15,\"pressure\":1012,\"humidity\":87},\"visibility\":10000,\
\"name\":\"Zaragoza\",\"cod\":200}";

pub fn response_with_condition(condition: &str) -> String {
    SAMPLE_RESPONSE.replace("\"main\":\"Rain\"", &format!("\"main\":\"{condition}\""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub channel: &'static str,
    pub high: bool,
}

impl PinEvent {
    pub fn new(channel: &'static str, high: bool) -> Self {
        Self { channel, high }
    }
}

/// Ordered record of writes across every channel sharing it.
#[derive(Debug, Clone, Default)]
pub struct PinLog {
    events: Arc<Mutex<Vec<PinEvent>>>,
}

impl PinLog {
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn events(&self) -> Vec<PinEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn level(&self, channel: &str) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|event| event.channel == channel)
            .is_some_and(|event| event.high)
    }

    /// Latest (red, green, blue) levels.
    pub fn levels(&self) -> (bool, bool, bool) {
        (self.level("red"), self.level("green"), self.level("blue"))
    }

    fn push(&self, event: PinEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Debug)]
pub struct RecordingChannel {
    name: &'static str,
    log: PinLog,
    pub fail_high: bool,
}

impl RecordingChannel {
    pub fn new(name: &'static str, log: &PinLog) -> Self {
        Self {
            name,
            log: log.clone(),
            fail_high: false,
        }
    }
}

impl OutputChannel for RecordingChannel {
    fn set_level(&mut self, high: bool) -> Result<(), IndicatorError> {
        if high && self.fail_high {
            return Err(IndicatorError {
                channel: self.name,
                message: "injected failure".to_string(),
            });
        }
        self.log.push(PinEvent::new(self.name, high));
        Ok(())
    }
}

/// Records every requested delay without sleeping, optionally moving a
/// simulated clock forward by the same amount.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    recorded: Vec<Duration>,
    clock: Option<SimClock>,
}

impl RecordingDelay {
    pub fn advancing(clock: &SimClock) -> Self {
        Self {
            recorded: Vec::new(),
            clock: Some(clock.clone()),
        }
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded.clone()
    }
}

impl Delay for RecordingDelay {
    fn delay(&mut self, duration: Duration) {
        self.recorded.push(duration);
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
    }
}

#[derive(Debug)]
struct SimClockState {
    now: NaiveDateTime,
    synced_time: Option<NaiveDateTime>,
    pending_rounds: usize,
    sync_calls: usize,
    timezone: Option<String>,
}

/// Shared simulated wall clock. Synchronization fails with `Pending` for a
/// scripted number of rounds, then jumps to the scripted time.
#[derive(Debug, Clone)]
pub struct SimClock {
    state: Arc<Mutex<SimClockState>>,
}

impl SimClock {
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimClockState {
                now: civil(year, month, day, hour, minute),
                synced_time: None,
                pending_rounds: 0,
                sync_calls: 0,
                timezone: None,
            })),
        }
    }

    /// A clock that reads the epoch, as after a power loss.
    pub fn unset() -> Self {
        Self::at(1970, 1, 1, 0, 0)
    }

    pub fn syncs_to(&self, time: NaiveDateTime, after_pending_rounds: usize) {
        let mut state = self.state.lock().unwrap();
        state.synced_time = Some(time);
        state.pending_rounds = after_pending_rounds;
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.now += chrono::Duration::from_std(duration).unwrap();
    }

    pub fn sync_calls(&self) -> usize {
        self.state.lock().unwrap().sync_calls
    }

    pub fn timezone(&self) -> Option<String> {
        self.state.lock().unwrap().timezone.clone()
    }
}

impl TimeSource for SimClock {
    fn now(&self) -> WallClock {
        WallClock::from_civil(&self.state.lock().unwrap().now)
    }

    fn synchronize(&mut self) -> Result<(), ClockError> {
        let mut state = self.state.lock().unwrap();
        state.sync_calls += 1;
        if state.pending_rounds > 0 {
            state.pending_rounds -= 1;
            return Err(ClockError::Pending);
        }
        match state.synced_time {
            Some(time) => {
                state.now = time;
                Ok(())
            }
            None => Err(ClockError::Pending),
        }
    }

    fn set_timezone(&mut self, timezone: &str) -> Result<(), ClockError> {
        self.state.lock().unwrap().timezone = Some(timezone.to_string());
        Ok(())
    }
}

pub fn civil(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub counter: u32,
    pub fail_load: bool,
    pub fail_store: bool,
    pub stored: Vec<u32>,
}

impl MemoryStore {
    pub fn with_counter(counter: u32) -> Self {
        Self {
            counter,
            ..Self::default()
        }
    }
}

impl BootStore for MemoryStore {
    fn load(&mut self) -> Result<u32, PersistenceError> {
        if self.fail_load {
            return Err(PersistenceError("injected load failure".to_string()));
        }
        Ok(self.counter)
    }

    fn store(&mut self, counter: u32) -> Result<(), PersistenceError> {
        if self.fail_store {
            return Err(PersistenceError("injected store failure".to_string()));
        }
        self.counter = counter;
        self.stored.push(counter);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SocketLog {
    sent: Vec<u8>,
    receive_timeout: Option<Duration>,
}

/// Socket that hands out scripted chunks, then either closes or times out.
#[derive(Debug)]
pub struct FakeSocket {
    chunks: VecDeque<Vec<u8>>,
    pub timeout_at_end: bool,
    pub send_error: Option<io::ErrorKind>,
    pub timeout_error: Option<io::ErrorKind>,
    log: Arc<Mutex<SocketLog>>,
}

impl FakeSocket {
    pub fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            timeout_at_end: false,
            send_error: None,
            timeout_error: None,
            log: Arc::default(),
        }
    }
}

impl Socket for FakeSocket {
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<(), FetchError> {
        if let Some(kind) = self.timeout_error {
            return Err(FetchError::Socket(io::Error::from(kind)));
        }
        self.log.lock().unwrap().receive_timeout = Some(timeout);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), FetchError> {
        if let Some(kind) = self.send_error {
            return Err(FetchError::Send(io::Error::from(kind)));
        }
        self.log.lock().unwrap().sent.extend_from_slice(bytes);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return if self.timeout_at_end {
                Err(FetchError::ReceiveTimeout)
            } else {
                Ok(0)
            };
        };

        if chunk.len() > buf.len() {
            let rest = chunk.split_off(buf.len());
            self.chunks.push_front(rest);
        }
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

/// Network whose single endpoint answers with a canned response.
#[derive(Debug)]
pub struct FakeNetwork {
    response: Vec<u8>,
    pub link: LinkState,
    pub fail_resolve: bool,
    pub connect_error: Option<io::ErrorKind>,
    /// Failures handed to every socket this network opens.
    pub send_error: Option<io::ErrorKind>,
    pub timeout_error: Option<io::ErrorKind>,
    /// The socket accepts the request but never answers.
    pub stall: bool,
    bring_up_calls: usize,
    resolve_calls: usize,
    log: Arc<Mutex<SocketLog>>,
}

impl FakeNetwork {
    pub fn responding(response: &str) -> Self {
        Self {
            response: response.as_bytes().to_vec(),
            link: LinkState::Connected,
            fail_resolve: false,
            connect_error: None,
            send_error: None,
            timeout_error: None,
            stall: false,
            bring_up_calls: 0,
            resolve_calls: 0,
            log: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<u8> {
        self.log.lock().unwrap().sent.clone()
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.log.lock().unwrap().receive_timeout
    }

    pub fn bring_up_calls(&self) -> usize {
        self.bring_up_calls
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls
    }
}

impl Network for FakeNetwork {
    type Socket = FakeSocket;

    fn bring_up(&mut self) -> Result<LinkState, FetchError> {
        self.bring_up_calls += 1;
        Ok(self.link)
    }

    fn resolve(&mut self, host: &str, port: u16) -> Result<SocketAddr, FetchError> {
        self.resolve_calls += 1;
        if self.fail_resolve {
            return Err(FetchError::Resolution {
                host: host.to_string(),
                source: None,
            });
        }
        Ok(SocketAddr::from((Ipv4Addr::new(192, 0, 2, 10), port)))
    }

    fn connect(&mut self, addr: SocketAddr) -> Result<FakeSocket, FetchError> {
        if let Some(kind) = self.connect_error {
            return Err(FetchError::Connect {
                addr,
                source: io::Error::from(kind),
            });
        }

        let chunks = if self.stall {
            Vec::new()
        } else {
            self.response.chunks(100).map(<[u8]>::to_vec).collect()
        };
        Ok(FakeSocket {
            chunks: chunks.into(),
            timeout_at_end: self.stall,
            send_error: self.send_error,
            timeout_error: self.timeout_error,
            log: Arc::clone(&self.log),
        })
    }
}
