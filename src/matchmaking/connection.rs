//! Connection to the matchmaking server.
//!
//! [`ConnectionManager`] owns the transport endpoint for the duration of one
//! matchmaking cycle: bounded connect retries, JSON send/receive on the fixed
//! matchmaking channel, and a graceful-then-forced disconnect sequence with a
//! single idempotent teardown entry point.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::messages::Envelope;
use super::session::SessionShared;
use crate::config::SessionConfig;
use crate::config::matchmaking::MATCHMAKING_CHANNEL;
use crate::error::MatchmakingError;
use crate::transport::{Endpoint, EndpointBinder, Event};

pub(crate) struct ConnectionManager {
    binder: Arc<dyn EndpointBinder>,
    config: SessionConfig,
    shared: Arc<SessionShared>,
    endpoint: Option<Box<dyn Endpoint>>,
    connected: bool,
}

impl ConnectionManager {
    pub(crate) fn new(
        binder: Arc<dyn EndpointBinder>,
        config: SessionConfig,
        shared: Arc<SessionShared>,
    ) -> Self {
        Self {
            binder,
            config,
            shared,
            endpoint: None,
            connected: false,
        }
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Bind the session's local port and reach the server, waiting up to
    /// `connect_attempts` × `connect_wait` for the connect acknowledgment.
    /// The local port is fixed so the same NAT mapping can later carry the
    /// peer connection when hosting.
    pub(crate) fn connect(&mut self) -> Result<(), MatchmakingError> {
        if self.connected {
            return Ok(());
        }
        if self.endpoint.is_none() {
            let endpoint = self.binder.bind(
                self.config.local_port,
                &self.config.server_host,
                self.config.server_port,
            )?;
            self.endpoint = Some(endpoint);
        }
        let Some(endpoint) = self.endpoint.as_mut() else {
            return Err(MatchmakingError::transport("no endpoint after bind"));
        };

        for attempt in 1..=self.config.connect_attempts {
            if self.shared.is_cancelled() {
                return Err(MatchmakingError::transport("connect cancelled"));
            }
            match endpoint.service(self.config.connect_wait) {
                Some(Event::Connected) => {
                    endpoint.enable_intercept();
                    self.connected = true;
                    info!("[Matchmaking] Connected to mm server");
                    return Ok(());
                }
                other => {
                    debug!(
                        "[Matchmaking] Connect attempt {attempt}/{} pending (event: {other:?})",
                        self.config.connect_attempts
                    );
                }
            }
        }

        error!("[Matchmaking] Failed to connect to mm server");
        Err(MatchmakingError::transport(
            "could not reach the matchmaking server",
        ))
    }

    /// Serialize and send one envelope on the matchmaking channel.
    pub(crate) fn send_json(&mut self, message: &Envelope) -> Result<(), MatchmakingError> {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return Err(MatchmakingError::transport("send on a torn-down connection"));
        };
        let payload = serde_json::to_vec(message)
            .map_err(|e| MatchmakingError::protocol(format!("failed to encode request: {e}")))?;
        endpoint.send_reliable(MATCHMAKING_CHANNEL, &payload)
    }

    /// Poll the transport up to `max_attempts` × `receive_poll` for the next
    /// message and parse it as an envelope. Disconnect events are noted but
    /// do not abort the poll.
    pub(crate) fn receive_json(&mut self, max_attempts: u32) -> Result<Envelope, MatchmakingError> {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return Err(MatchmakingError::transport(
                "receive on a torn-down connection",
            ));
        };

        for _ in 0..max_attempts {
            if self.shared.is_cancelled() {
                return Err(MatchmakingError::protocol("receive cancelled"));
            }
            match endpoint.service(self.config.receive_poll) {
                Some(Event::Message(payload)) => {
                    return serde_json::from_slice(&payload).map_err(|e| {
                        MatchmakingError::protocol(format!("malformed server message: {e}"))
                    });
                }
                Some(Event::Disconnected) => {
                    warn!("[Matchmaking] Server disconnect while awaiting a response");
                }
                Some(Event::Connected) | None => {}
            }
        }

        Err(MatchmakingError::protocol("no response from server"))
    }

    /// Gracefully disconnect from the server, draining events for up to
    /// `disconnect_drain` awaiting the acknowledgment; reset the peer if it
    /// never arrives. No-op when not connected.
    pub(crate) fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        endpoint.disconnect_peer();

        let deadline = Instant::now() + self.config.disconnect_drain;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match endpoint.service(deadline - now) {
                Some(Event::Disconnected) => {
                    debug!("[Matchmaking] Disconnected from mm server");
                    return;
                }
                // Drain stray messages until the ack arrives.
                Some(_) => {}
                None => break,
            }
        }

        warn!("[Matchmaking] Disconnect not acknowledged, resetting connection");
        endpoint.reset_peer();
    }

    /// Disconnect and release the local endpoint. Safe to call repeatedly
    /// and from any state.
    pub(crate) fn teardown(&mut self) {
        self.disconnect();
        if self.endpoint.take().is_some() {
            debug!("[Matchmaking] Released local endpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::memory::{self, ClientFrame, MemoryBinder, ServerEvent};

    fn test_config() -> SessionConfig {
        SessionConfig::new("mm.example.net", 43113)
            .with_connect_bounds(3, Duration::from_millis(5))
            .with_receive_bounds(4, Duration::from_millis(5))
            .with_disconnect_drain(Duration::from_millis(30))
    }

    fn manager_with_pair() -> (ConnectionManager, memory::MemoryServer) {
        let (endpoint, server) = memory::pair(51000);
        let binder = Arc::new(MemoryBinder::new([endpoint]));
        let shared = Arc::new(SessionShared::new());
        (
            ConnectionManager::new(binder, test_config(), shared),
            server,
        )
    }

    #[test]
    fn connect_succeeds_once_accepted() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("accepted connect");
        // Idempotent while connected.
        conn.connect().expect("second connect is a no-op");
    }

    #[test]
    fn connect_fails_after_exhausting_attempts() {
        let (mut conn, _server) = manager_with_pair();
        let result = conn.connect();
        assert!(matches!(result, Err(MatchmakingError::Transport(_))));
    }

    #[test]
    fn receive_parses_first_message() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("connect");

        server.send(br#"{"type":"create-ticket-resp","ticketId":"abc123"}"#.to_vec());
        let envelope = conn.receive_json(4).expect("one message queued");
        assert_eq!(
            envelope,
            Envelope::CreateTicketResp {
                ticket_id: "abc123".to_string(),
                error: None,
            }
        );
    }

    #[test]
    fn receive_times_out_without_message() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("connect");
        assert!(matches!(
            conn.receive_json(2),
            Err(MatchmakingError::Protocol(_))
        ));
    }

    #[test]
    fn receive_survives_disconnect_events() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("connect");

        server.close();
        server.send(br#"{"type":"delete-ticket-resp"}"#.to_vec());
        let envelope = conn.receive_json(4).expect("message after disconnect event");
        assert_eq!(envelope, Envelope::DeleteTicketResp { error: None });
    }

    #[test]
    fn malformed_message_is_a_protocol_error() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("connect");

        server.send(b"not json".to_vec());
        assert!(matches!(
            conn.receive_json(2),
            Err(MatchmakingError::Protocol(_))
        ));
    }

    #[test]
    fn graceful_disconnect_needs_no_reset() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("connect");

        server.close(); // Ack queued ahead of the request; still counts.
        conn.disconnect();

        assert_eq!(
            server.recv_timeout(Duration::from_millis(10)),
            ServerEvent::Frame(ClientFrame::Disconnect)
        );
        assert_eq!(
            server.recv_timeout(Duration::from_millis(10)),
            ServerEvent::Idle
        );
    }

    #[test]
    fn unacknowledged_disconnect_resets_the_peer() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("connect");

        conn.disconnect();

        assert_eq!(
            server.recv_timeout(Duration::from_millis(10)),
            ServerEvent::Frame(ClientFrame::Disconnect)
        );
        assert_eq!(
            server.recv_timeout(Duration::from_millis(50)),
            ServerEvent::Frame(ClientFrame::Reset)
        );
    }

    #[test]
    fn teardown_is_idempotent_and_blocks_further_sends() {
        let (mut conn, server) = manager_with_pair();
        server.accept();
        conn.connect().expect("connect");

        conn.teardown();
        conn.teardown();

        let request = Envelope::GetTicket {
            ticket_id: "abc123".to_string(),
        };
        assert!(matches!(
            conn.send_json(&request),
            Err(MatchmakingError::Transport(_))
        ));
    }
}
