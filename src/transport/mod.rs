//! Transport layer seam.
//!
//! The matchmaking protocol runs over a connection-oriented, reliable,
//! ordered, message-boundary-preserving channel multiplexed on an unreliable
//! datagram network. This module abstracts that channel behind two traits so
//! the engine can sit on any such binding, and so tests can drive it with the
//! in-process [`memory`] transport.

pub mod memory;

use std::time::Duration;

use crate::error::MatchmakingError;

/// An event surfaced by [`Endpoint::service`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The connection to the server completed.
    Connected,
    /// The server disconnected (graceful-disconnect acknowledgments arrive
    /// this way too).
    Disconnected,
    /// One whole message, boundaries preserved.
    Message(Vec<u8>),
}

/// A local transport endpoint with one peer: the matchmaking server.
///
/// The endpoint is bound to a fixed local port at creation and starts
/// connecting immediately; [`Event::Connected`] reports completion.
pub trait Endpoint: Send {
    /// Block up to `timeout` for the next transport event. `None` means the
    /// window elapsed with nothing to report.
    fn service(&mut self, timeout: Duration) -> Option<Event>;

    /// Send one message on the given logical channel with guaranteed,
    /// ordered delivery.
    fn send_reliable(&mut self, channel: u8, payload: &[u8]) -> Result<(), MatchmakingError>;

    /// Request a graceful disconnect from the peer. The acknowledgment
    /// arrives as [`Event::Disconnected`].
    fn disconnect_peer(&mut self);

    /// Drop the peer without a disconnect handshake.
    fn reset_peer(&mut self);

    /// Enable the transport-level packet interception hook, if the binding
    /// has one. Called once the connection is established.
    fn enable_intercept(&mut self);
}

/// Factory for [`Endpoint`]s.
///
/// Implementations bind `local_port` and begin connecting to
/// `server_host:server_port`. Each matchmaking cycle asks for a fresh
/// endpoint, so a binder may be called more than once per session.
pub trait EndpointBinder: Send + Sync {
    fn bind(
        &self,
        local_port: u16,
        server_host: &str,
        server_port: u16,
    ) -> Result<Box<dyn Endpoint>, MatchmakingError>;
}
