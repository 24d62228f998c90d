//! Client-side matchmaking engine for peer-to-peer netplay.
//!
//! The engine talks to a rendezvous server over a reliable datagram
//! transport, queues for an opponent with a ticket protocol
//! (`create-ticket` / `get-ticket` / `delete-ticket` JSON messages), and on
//! assignment tears the server connection down and drives a peer-to-peer
//! connection to completion. When this side hosts, the peer connection
//! reuses the local port that carried the server connection, so the
//! opponent can come back in through the NAT mapping that is already open.
//!
//! The protocol runs on one background thread per session; the owning
//! caller polls [`MatchmakingSession::state`] and collects the established
//! connection with [`MatchmakingSession::take_peer_connection`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use peermatch::{MatchmakingSession, ProcessState, SessionConfig};
//! # fn collaborators() -> (
//! #     Arc<dyn peermatch::EndpointBinder>,
//! #     Arc<dyn peermatch::UserStore>,
//! #     Arc<dyn peermatch::PeerConnector>,
//! # ) { unimplemented!() }
//!
//! let (binder, user_store, peer_connector) = collaborators();
//! let config = SessionConfig::new("mm.example.net", 43113);
//! let mut session = MatchmakingSession::new(config, binder, user_store, peer_connector);
//!
//! session.find_match().expect("not already searching");
//! while session.is_searching() {
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! if session.state() == ProcessState::ConnectionSuccess {
//!     let peer = session.take_peer_connection().expect("first take");
//!     // hand `peer` to the netplay layer
//! }
//! ```

pub mod config;
pub mod error;
pub mod matchmaking;
pub mod peer;
pub mod transport;
pub mod user;

pub use config::SessionConfig;
pub use error::MatchmakingError;
pub use matchmaking::messages::{Envelope, TicketUser};
pub use matchmaking::{MatchmakingSession, ProcessState};
pub use peer::{ConnectStatus, PeerConnection, PeerConnector};
pub use transport::{Endpoint, EndpointBinder, Event};
pub use user::{UserInfo, UserStore};
