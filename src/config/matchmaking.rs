/// Matchmaking protocol configuration.
///
/// This module defines the timing bounds and retry limits of the rendezvous
/// protocol, and the per-session configuration built on top of them. Every
/// wait in the engine is bounded by one of these values; there is no
/// unbounded blocking anywhere.
use std::time::Duration;

/// Local port the session binds for the server connection. Reused by the
/// peer connection when hosting, so the opponent can connect back through
/// the NAT mapping already opened toward the matchmaking server.
pub const DEFAULT_LOCAL_PORT: u16 = 51000;

/// Maximum connect attempts to the matchmaking server.
pub const CONNECT_ATTEMPTS: u32 = 30;

/// Wait per connect attempt for the connect acknowledgment.
pub const CONNECT_WAIT: Duration = Duration::from_millis(1000);

/// Maximum receive iterations while awaiting a protocol response.
pub const RECEIVE_ATTEMPTS: u32 = 20;

/// Wait per receive iteration.
pub const RECEIVE_POLL: Duration = Duration::from_millis(250);

/// Total time to drain events awaiting a graceful-disconnect acknowledgment
/// before the peer is forcibly reset.
pub const DISCONNECT_DRAIN: Duration = Duration::from_millis(3000);

/// Pause between ticket polls, and between peer connection status checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Logical channel carrying all matchmaking messages.
pub const MATCHMAKING_CHANNEL: u8 = 0;

/// Longest slice the worker sleeps without re-checking for cancellation.
pub(crate) const CANCEL_SLICE: Duration = Duration::from_millis(100);

/// Per-session configuration.
///
/// Only the server address is required; the timing fields default to the
/// protocol constants above. The setters exist mainly so tests can shrink
/// the bounds and drive a full session in milliseconds.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Matchmaking server hostname or address.
    pub server_host: String,
    /// Matchmaking server port.
    pub server_port: u16,
    /// Fixed local port for the session's lifetime (hole-punch port).
    pub local_port: u16,
    pub connect_attempts: u32,
    pub connect_wait: Duration,
    pub receive_attempts: u32,
    pub receive_poll: Duration,
    pub disconnect_drain: Duration,
    pub poll_interval: Duration,
}

impl SessionConfig {
    /// Create a configuration for the given server with default bounds.
    pub fn new(server_host: impl Into<String>, server_port: u16) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            local_port: DEFAULT_LOCAL_PORT,
            connect_attempts: CONNECT_ATTEMPTS,
            connect_wait: CONNECT_WAIT,
            receive_attempts: RECEIVE_ATTEMPTS,
            receive_poll: RECEIVE_POLL,
            disconnect_drain: DISCONNECT_DRAIN,
            poll_interval: POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    #[must_use]
    pub fn with_connect_bounds(mut self, attempts: u32, wait: Duration) -> Self {
        self.connect_attempts = attempts;
        self.connect_wait = wait;
        self
    }

    #[must_use]
    pub fn with_receive_bounds(mut self, attempts: u32, poll: Duration) -> Self {
        self.receive_attempts = attempts;
        self.receive_poll = poll;
        self
    }

    #[must_use]
    pub fn with_disconnect_drain(mut self, drain: Duration) -> Self {
        self.disconnect_drain = drain;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
