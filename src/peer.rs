//! Peer-to-peer netplay connection collaborator.
//!
//! Once the server assigns an opponent, the engine instantiates one peer
//! connection through a [`PeerConnector`] and polls it to completion. The
//! connection's internal transport and concurrency are not this crate's
//! concern; the engine only ever asks for its status.

/// Tri-state progress of a peer connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Handshake initiated, outcome unknown.
    InProgress,
    /// Attempt failed; the engine discards the connection and requeues.
    Failed,
    /// Connection established; ownership is handed to the caller.
    Succeeded,
}

/// An opaque peer-to-peer connection, polled by status.
pub trait PeerConnection: Send {
    fn status(&self) -> ConnectStatus;
}

/// Factory for peer connections.
///
/// `connect` must begin the connection attempt in the background and return
/// immediately; progress is observed through [`PeerConnection::status`].
/// When `is_host` is true the given port is the local port the connection
/// should listen on (the hole-punched port), not the opponent's.
pub trait PeerConnector: Send + Sync {
    fn connect(&self, host: &str, port: u16, is_host: bool) -> Box<dyn PeerConnection>;
}
