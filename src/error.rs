//! Error taxonomy for the matchmaking engine.
//!
//! Only terminal failures are errors. The two expected non-fatal outcomes,
//! a ticket that has not been assigned yet and a peer connection attempt
//! that failed and triggers a fresh matchmaking cycle, are ordinary results
//! (`TicketStatus::Pending`, `ConnectStatus::Failed`) rather than variants
//! here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchmakingError {
    /// Could not bind the local endpoint, reach the matchmaking server, or
    /// transmit on the established connection.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed response, response-type mismatch, timeout awaiting a
    /// response, or a server-reported `error` field.
    #[error("protocol failure: {0}")]
    Protocol(String),

    /// A ticket was requested without a logged-in user.
    #[error("must be logged in to queue for matchmaking")]
    NotLoggedIn,

    /// `find_match` was called while a search was already running.
    #[error("a matchmaking search is already in progress")]
    AlreadySearching,
}

impl MatchmakingError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
