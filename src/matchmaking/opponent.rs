//! Hand-off to the peer-to-peer connection.
//!
//! Once the server assigns an opponent, [`OpponentConnector`] parses the
//! reported address, instantiates the peer connection exactly once, and maps
//! its tri-state status onto the state machine's transitions. When this side
//! hosts, the parsed port is overridden with the session's fixed local port:
//! the opponent connects back through the NAT mapping the matchmaking
//! connection already opened.

use std::sync::Arc;

use log::info;

use crate::error::MatchmakingError;
use crate::peer::{ConnectStatus, PeerConnection, PeerConnector};

/// Progress of the current peer connection attempt.
pub(crate) enum ConnectProgress {
    InProgress,
    /// The attempt failed and the connection was discarded; a fresh
    /// matchmaking cycle should begin.
    Failed,
    /// The established connection, ready for hand-off to the caller.
    Succeeded(Box<dyn PeerConnection>),
}

pub(crate) struct OpponentConnector {
    connector: Arc<dyn PeerConnector>,
    pending: Option<Box<dyn PeerConnection>>,
}

impl OpponentConnector {
    pub(crate) fn new(connector: Arc<dyn PeerConnector>) -> Self {
        Self {
            connector,
            pending: None,
        }
    }

    /// Instantiate the peer connection on first call, then report its
    /// current status. A failed attempt is discarded here so the next
    /// assignment starts from scratch.
    pub(crate) fn drive(
        &mut self,
        opponent: &str,
        is_host: bool,
        host_port: u16,
    ) -> Result<ConnectProgress, MatchmakingError> {
        let peer = match self.pending.take() {
            Some(peer) => peer,
            None => {
                let (host, parsed_port) = split_address(opponent)?;
                let port = if is_host { host_port } else { parsed_port };
                info!("[Matchmaking] Connecting to opponent {host}:{port} (isHost: {is_host})");
                self.connector.connect(host, port, is_host)
            }
        };

        match peer.status() {
            ConnectStatus::InProgress => {
                self.pending = Some(peer);
                Ok(ConnectProgress::InProgress)
            }
            ConnectStatus::Failed => Ok(ConnectProgress::Failed),
            ConnectStatus::Succeeded => Ok(ConnectProgress::Succeeded(peer)),
        }
    }
}

/// Split an `address:port` string as reported by the server.
fn split_address(address: &str) -> Result<(&str, u16), MatchmakingError> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(MatchmakingError::protocol(format!(
            "malformed opponent address: {address:?}"
        )));
    };
    if host.is_empty() {
        return Err(MatchmakingError::protocol(format!(
            "opponent address has no host: {address:?}"
        )));
    }
    let port = port.parse::<u16>().map_err(|_| {
        MatchmakingError::protocol(format!("opponent address has a bad port: {address:?}"))
    })?;
    Ok((host, port))
}
