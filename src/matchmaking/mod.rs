//! Matchmaking engine root module.
//!
//! This module organizes the client side of the rendezvous protocol:
//! - Wire messages of the ticket protocol
//! - Server connection management (connect, send/receive, teardown)
//! - Ticket queueing (create, poll, delete)
//! - Hand-off to the peer-to-peer connection
//! - The session handle and its background state machine

pub mod messages;
pub mod session;

pub(crate) mod connection;
pub(crate) mod opponent;
pub(crate) mod ticket;


pub use session::{MatchmakingSession, ProcessState};
