//! Ticket protocol client.
//!
//! Builds and validates the three request/response pairs of the queueing
//! protocol on top of [`ConnectionManager`]. Create and poll failures are
//! terminal for the session; delete is best-effort cleanup and only logs.

use log::{debug, error, info, warn};

use super::connection::ConnectionManager;
use super::messages::{Envelope, TicketUser, reported_error};
use crate::error::MatchmakingError;
use crate::user::UserStore;

/// Outcome of polling a live ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TicketStatus {
    /// Not assigned yet; wait and poll again.
    Pending,
    /// Opponent assigned.
    Assigned { opponent: String, is_host: bool },
}

pub(crate) struct TicketClient<'a> {
    conn: &'a mut ConnectionManager,
    user: &'a dyn UserStore,
}

impl<'a> TicketClient<'a> {
    pub(crate) fn new(conn: &'a mut ConnectionManager, user: &'a dyn UserStore) -> Self {
        Self { conn, user }
    }

    /// Queue for a match. Returns the server-issued ticket id.
    pub(crate) fn create_ticket(&mut self) -> Result<String, MatchmakingError> {
        if !self.user.is_logged_in() {
            error!("[Matchmaking] Must be logged in to queue");
            return Err(MatchmakingError::NotLoggedIn);
        }
        let info = self.user.user_info();

        self.conn.send_json(&Envelope::CreateTicket {
            user: TicketUser {
                uid: info.uid,
                play_key: info.play_key,
            },
        })?;

        let attempts = self.conn.config().receive_attempts;
        match self.conn.receive_json(attempts)? {
            Envelope::CreateTicketResp { ticket_id, error } => {
                if let Some(err) = reported_error(&error) {
                    error!("[Matchmaking] Server rejected create ticket: {err}");
                    return Err(MatchmakingError::protocol(format!(
                        "create-ticket rejected: {err}"
                    )));
                }
                info!("[Matchmaking] Request ticket success: {ticket_id}");
                Ok(ticket_id)
            }
            other => {
                error!("[Matchmaking] Incorrect response for create ticket: {other:?}");
                Err(MatchmakingError::protocol(
                    "unexpected response type for create-ticket",
                ))
            }
        }
    }

    /// Ask whether the ticket has been assigned an opponent yet.
    pub(crate) fn poll_ticket(&mut self, ticket_id: &str) -> Result<TicketStatus, MatchmakingError> {
        self.conn.send_json(&Envelope::GetTicket {
            ticket_id: ticket_id.to_string(),
        })?;

        let attempts = self.conn.config().receive_attempts;
        match self.conn.receive_json(attempts)? {
            Envelope::GetTicketResp {
                is_assigned,
                opp_address,
                is_host,
                error,
            } => {
                if let Some(err) = reported_error(&error) {
                    error!("[Matchmaking] Server rejected get ticket: {err}");
                    return Err(MatchmakingError::protocol(format!(
                        "get-ticket rejected: {err}"
                    )));
                }
                if !is_assigned {
                    debug!("[Matchmaking] No assignment found yet");
                    return Ok(TicketStatus::Pending);
                }
                Ok(TicketStatus::Assigned {
                    opponent: opp_address,
                    is_host,
                })
            }
            other => {
                error!("[Matchmaking] Incorrect response for get ticket: {other:?}");
                Err(MatchmakingError::protocol(
                    "unexpected response type for get-ticket",
                ))
            }
        }
    }

    /// Release the ticket after assignment. Strictly best-effort: every
    /// failure is logged and swallowed so cleanup can never block the
    /// hand-off to the opponent connection.
    pub(crate) fn delete_ticket(&mut self, ticket_id: &str) {
        let request = Envelope::DeleteTicket {
            ticket_id: ticket_id.to_string(),
        };
        if let Err(e) = self.conn.send_json(&request) {
            warn!("[Matchmaking] Could not send delete ticket: {e}");
            return;
        }

        let attempts = self.conn.config().receive_attempts;
        match self.conn.receive_json(attempts) {
            Ok(Envelope::DeleteTicketResp { error }) => {
                if let Some(err) = reported_error(&error) {
                    warn!("[Matchmaking] Server reported error for delete ticket: {err}");
                }
            }
            Ok(other) => {
                warn!("[Matchmaking] Incorrect response for delete ticket: {other:?}");
            }
            Err(e) => {
                warn!("[Matchmaking] No response for delete ticket: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::super::session::SessionShared;
    use super::*;
    use crate::config::SessionConfig;
    use crate::transport::memory::{self, ClientFrame, MemoryBinder, ServerEvent};
    use crate::user::UserInfo;

    struct FakeUser {
        logged_in: bool,
    }

    impl UserStore for FakeUser {
        fn is_logged_in(&self) -> bool {
            self.logged_in
        }

        fn user_info(&self) -> UserInfo {
            UserInfo {
                uid: "user-1".to_string(),
                play_key: "key-1".to_string(),
            }
        }
    }

    fn connected_manager() -> (ConnectionManager, memory::MemoryServer) {
        let (endpoint, server) = memory::pair(51000);
        let binder = Arc::new(MemoryBinder::new([endpoint]));
        let config = SessionConfig::new("mm.example.net", 43113)
            .with_connect_bounds(2, Duration::from_millis(5))
            .with_receive_bounds(20, Duration::from_millis(10));
        let mut conn = ConnectionManager::new(binder, config, Arc::new(SessionShared::new()));
        server.accept();
        conn.connect().expect("connect");
        (conn, server)
    }

    fn pop_request(server: &memory::MemoryServer) -> Envelope {
        match server.recv_timeout(Duration::from_millis(200)) {
            ServerEvent::Frame(ClientFrame::Message { payload, .. }) => {
                serde_json::from_slice(&payload).expect("client request parses")
            }
            other => panic!("expected a request frame, got {other:?}"),
        }
    }

    #[test]
    fn create_ticket_requires_login() {
        let (mut conn, _server) = connected_manager();
        let user = FakeUser { logged_in: false };
        let mut client = TicketClient::new(&mut conn, &user);
        assert!(matches!(
            client.create_ticket(),
            Err(MatchmakingError::NotLoggedIn)
        ));
    }

    #[test]
    fn create_ticket_returns_server_ticket_id() {
        let (mut conn, server) = connected_manager();
        let responder = thread::spawn(move || {
            let request = pop_request(&server);
            assert_eq!(
                request,
                Envelope::CreateTicket {
                    user: TicketUser {
                        uid: "user-1".to_string(),
                        play_key: "key-1".to_string(),
                    },
                }
            );
            server.send(br#"{"type":"create-ticket-resp","ticketId":"abc123"}"#.to_vec());
        });

        let user = FakeUser { logged_in: true };
        let mut client = TicketClient::new(&mut conn, &user);
        let ticket_id = client.create_ticket().expect("server issued a ticket");
        assert_eq!(ticket_id, "abc123");
        responder.join().expect("responder thread");
    }

    #[test]
    fn create_ticket_rejects_error_field() {
        let (mut conn, server) = connected_manager();
        let responder = thread::spawn(move || {
            let _ = pop_request(&server);
            server.send(
                br#"{"type":"create-ticket-resp","ticketId":"","error":"banned"}"#.to_vec(),
            );
        });

        let user = FakeUser { logged_in: true };
        let mut client = TicketClient::new(&mut conn, &user);
        assert!(matches!(
            client.create_ticket(),
            Err(MatchmakingError::Protocol(_))
        ));
        responder.join().expect("responder thread");
    }

    #[test]
    fn create_ticket_rejects_type_mismatch() {
        let (mut conn, server) = connected_manager();
        let responder = thread::spawn(move || {
            let _ = pop_request(&server);
            server.send(br#"{"type":"get-ticket-resp","isAssigned":false}"#.to_vec());
        });

        let user = FakeUser { logged_in: true };
        let mut client = TicketClient::new(&mut conn, &user);
        assert!(matches!(
            client.create_ticket(),
            Err(MatchmakingError::Protocol(_))
        ));
        responder.join().expect("responder thread");
    }

    #[test]
    fn poll_ticket_maps_assignment_states() {
        let (mut conn, server) = connected_manager();
        let responder = thread::spawn(move || {
            assert_eq!(
                pop_request(&server),
                Envelope::GetTicket {
                    ticket_id: "abc123".to_string(),
                }
            );
            server.send(br#"{"type":"get-ticket-resp","isAssigned":false}"#.to_vec());

            let _ = pop_request(&server);
            server.send(
                br#"{"type":"get-ticket-resp","isAssigned":true,"oppAddress":"1.2.3.4:51001","isHost":true}"#
                    .to_vec(),
            );
        });

        let user = FakeUser { logged_in: true };
        let mut client = TicketClient::new(&mut conn, &user);
        assert_eq!(
            client.poll_ticket("abc123").expect("pending poll"),
            TicketStatus::Pending
        );
        assert_eq!(
            client.poll_ticket("abc123").expect("assigned poll"),
            TicketStatus::Assigned {
                opponent: "1.2.3.4:51001".to_string(),
                is_host: true,
            }
        );
        responder.join().expect("responder thread");
    }

    #[test]
    fn delete_ticket_failures_are_swallowed() {
        let (mut conn, server) = connected_manager();
        let user = FakeUser { logged_in: true };

        // No response at all: delete_ticket must still return.
        let mut client = TicketClient::new(&mut conn, &user);
        client.delete_ticket("abc123");

        assert_eq!(
            pop_request(&server),
            Envelope::DeleteTicket {
                ticket_id: "abc123".to_string(),
            }
        );
    }
}
