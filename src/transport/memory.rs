//! In-process transport over crossbeam channels.
//!
//! [`pair`] creates a client [`MemoryEndpoint`] wired to a [`MemoryServer`]
//! harness. The harness side is driven explicitly: it accepts the connection,
//! pops client frames, and pushes payloads or a disconnect back. Used for
//! loopback sessions and for exercising the engine hermetically in tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::{Endpoint, EndpointBinder, Event};
use crate::error::MatchmakingError;

/// Frame sent by the client endpoint toward the server harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Message { channel: u8, payload: Vec<u8> },
    /// Graceful disconnect request.
    Disconnect,
    /// Forced reset, no handshake expected.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ServerFrame {
    Connected,
    Disconnected,
    Message(Vec<u8>),
}

/// Outcome of [`MemoryServer::recv_timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Frame(ClientFrame),
    /// Nothing arrived within the window.
    Idle,
    /// The client endpoint was dropped; no more frames will arrive.
    Closed,
}

/// Client half of an in-process transport pair.
pub struct MemoryEndpoint {
    rx: Receiver<ServerFrame>,
    tx: Sender<ClientFrame>,
    local_port: u16,
    intercept: bool,
}

impl MemoryEndpoint {
    /// Local port this endpoint was bound with.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Whether the interception hook was enabled after connecting.
    pub fn intercept_enabled(&self) -> bool {
        self.intercept
    }
}

impl Endpoint for MemoryEndpoint {
    fn service(&mut self, timeout: Duration) -> Option<Event> {
        match self.rx.recv_timeout(timeout) {
            Ok(ServerFrame::Connected) => Some(Event::Connected),
            Ok(ServerFrame::Disconnected) => Some(Event::Disconnected),
            Ok(ServerFrame::Message(payload)) => Some(Event::Message(payload)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn send_reliable(&mut self, channel: u8, payload: &[u8]) -> Result<(), MatchmakingError> {
        self.tx
            .send(ClientFrame::Message {
                channel,
                payload: payload.to_vec(),
            })
            .map_err(|_| MatchmakingError::transport("server side of memory transport is gone"))
    }

    fn disconnect_peer(&mut self) {
        let _ = self.tx.send(ClientFrame::Disconnect);
    }

    fn reset_peer(&mut self) {
        let _ = self.tx.send(ClientFrame::Reset);
    }

    fn enable_intercept(&mut self) {
        self.intercept = true;
    }
}

/// Server half of an in-process transport pair.
pub struct MemoryServer {
    rx: Receiver<ClientFrame>,
    tx: Sender<ServerFrame>,
}

impl MemoryServer {
    /// Acknowledge the pending connection attempt.
    pub fn accept(&self) {
        let _ = self.tx.send(ServerFrame::Connected);
    }

    /// Deliver one message to the client.
    pub fn send(&self, payload: Vec<u8>) {
        let _ = self.tx.send(ServerFrame::Message(payload));
    }

    /// Disconnect the client (also serves as the graceful-disconnect ack).
    pub fn close(&self) {
        let _ = self.tx.send(ServerFrame::Disconnected);
    }

    /// Wait up to `timeout` for the next client frame.
    pub fn recv_timeout(&self, timeout: Duration) -> ServerEvent {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => ServerEvent::Frame(frame),
            Err(RecvTimeoutError::Timeout) => ServerEvent::Idle,
            Err(RecvTimeoutError::Disconnected) => ServerEvent::Closed,
        }
    }
}

/// Create a connected client/server transport pair. The connection is not
/// considered established until the server calls [`MemoryServer::accept`].
pub fn pair(local_port: u16) -> (MemoryEndpoint, MemoryServer) {
    let (client_tx, server_rx) = unbounded();
    let (server_tx, client_rx) = unbounded();
    (
        MemoryEndpoint {
            rx: client_rx,
            tx: client_tx,
            local_port,
            intercept: false,
        },
        MemoryServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

/// [`EndpointBinder`] handing out pre-built memory endpoints, one per
/// matchmaking cycle, in order.
pub struct MemoryBinder {
    endpoints: Mutex<VecDeque<MemoryEndpoint>>,
}

impl MemoryBinder {
    pub fn new(endpoints: impl IntoIterator<Item = MemoryEndpoint>) -> Self {
        Self {
            endpoints: Mutex::new(endpoints.into_iter().collect()),
        }
    }
}

impl EndpointBinder for MemoryBinder {
    fn bind(
        &self,
        _local_port: u16,
        _server_host: &str,
        _server_port: u16,
    ) -> Result<Box<dyn Endpoint>, MatchmakingError> {
        let mut endpoints = match self.endpoints.lock() {
            Ok(endpoints) => endpoints,
            Err(poisoned) => poisoned.into_inner(),
        };
        match endpoints.pop_front() {
            Some(endpoint) => Ok(Box::new(endpoint)),
            None => Err(MatchmakingError::transport(
                "memory binder has no endpoint left",
            )),
        }
    }
}
