//! Matchmaking session and state machine.
//!
//! [`MatchmakingSession`] is the public handle: it starts a search, exposes
//! the current state to the foreground, and hands out the peer connection
//! once one is established. The protocol itself runs on one dedicated
//! background thread per search, dispatching on the current state each
//! iteration:
//!
//! `Initializing` (connect + create ticket) → `Matchmaking` (poll ticket
//! every second) → `OpponentConnecting` (drive the peer connection) →
//! `ConnectionSuccess`, with `ErrorEncountered` as the terminal failure
//! state. A failed peer connection loops back to `Initializing` for a fresh
//! ticket.
//!
//! Forcing the state to `ErrorEncountered` is the sole cancellation signal;
//! every bounded wait in the worker re-checks it, so teardown latency is
//! bounded by a single wait slice.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::connection::ConnectionManager;
use super::opponent::{ConnectProgress, OpponentConnector};
use super::ticket::{TicketClient, TicketStatus};
use crate::config::SessionConfig;
use crate::config::matchmaking::CANCEL_SLICE;
use crate::error::MatchmakingError;
use crate::peer::{PeerConnection, PeerConnector};
use crate::transport::EndpointBinder;
use crate::user::UserStore;

/// State of a matchmaking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessState {
    Idle = 0,
    Initializing = 1,
    Matchmaking = 2,
    OpponentConnecting = 3,
    ConnectionSuccess = 4,
    ErrorEncountered = 5,
}

impl ProcessState {
    /// True while the background worker is (or should be) running.
    pub fn is_searching(self) -> bool {
        matches!(
            self,
            ProcessState::Initializing | ProcessState::Matchmaking | ProcessState::OpponentConnecting
        )
    }

    fn from_u8(raw: u8) -> ProcessState {
        match raw {
            0 => ProcessState::Idle,
            1 => ProcessState::Initializing,
            2 => ProcessState::Matchmaking,
            3 => ProcessState::OpponentConnecting,
            4 => ProcessState::ConnectionSuccess,
            _ => ProcessState::ErrorEncountered,
        }
    }
}

/// Lock-free state cell read by the foreground while the worker mutates it.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: ProcessState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: ProcessState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move `from → to`, but lose to any concurrent change — in particular
    /// to an external cancellation, which must never be overwritten.
    fn transition(&self, from: ProcessState, to: ProcessState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// State shared between the session handle and its worker thread.
pub(crate) struct SessionShared {
    state: StateCell,
    ticket_id: Mutex<String>,
    peer: Mutex<Option<Box<dyn PeerConnection>>>,
}

fn lock_or_recover<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SessionShared {
    pub(crate) fn new() -> Self {
        Self {
            state: StateCell::new(ProcessState::Idle),
            ticket_id: Mutex::new(String::new()),
            peer: Mutex::new(None),
        }
    }

    /// Whether the session was forced into the terminal failure state.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.get() == ProcessState::ErrorEncountered
    }

    fn ticket_id(&self) -> String {
        lock_or_recover(&self.ticket_id).clone()
    }

    fn set_ticket(&self, ticket_id: &str) {
        let mut guard = lock_or_recover(&self.ticket_id);
        guard.clear();
        guard.push_str(ticket_id);
    }

    fn put_peer(&self, peer: Box<dyn PeerConnection>) {
        *lock_or_recover(&self.peer) = Some(peer);
    }

    fn take_peer(&self) -> Option<Box<dyn PeerConnection>> {
        lock_or_recover(&self.peer).take()
    }
}

/// Handle to one matchmaking session.
///
/// Dropping the handle cancels the search and joins the worker thread.
pub struct MatchmakingSession {
    config: SessionConfig,
    shared: Arc<SessionShared>,
    binder: Arc<dyn EndpointBinder>,
    user_store: Arc<dyn UserStore>,
    peer_connector: Arc<dyn PeerConnector>,
    worker: Option<JoinHandle<()>>,
}

impl MatchmakingSession {
    pub fn new(
        config: SessionConfig,
        binder: Arc<dyn EndpointBinder>,
        user_store: Arc<dyn UserStore>,
        peer_connector: Arc<dyn PeerConnector>,
    ) -> Self {
        Self {
            config,
            shared: Arc::new(SessionShared::new()),
            binder,
            user_store,
            peer_connector,
            worker: None,
        }
    }

    /// Start searching for an opponent on a background thread.
    ///
    /// Only valid from `Idle` or a terminal state; a running search is
    /// rejected with [`MatchmakingError::AlreadySearching`]. The session's
    /// local port is fixed here for the whole search, including the peer
    /// connection when hosting.
    pub fn find_match(&mut self) -> Result<(), MatchmakingError> {
        if self.shared.state.get().is_searching() {
            return Err(MatchmakingError::AlreadySearching);
        }
        // A previous worker, if any, has already left the searching set.
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("[Matchmaking] Previous worker thread panicked");
            }
        }
        self.shared.set_ticket("");
        let _ = self.shared.take_peer();

        self.shared.state.set(ProcessState::Initializing);
        info!(
            "[Matchmaking] Starting search (local port {})",
            self.config.local_port
        );

        let worker = Worker {
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            conn: ConnectionManager::new(
                Arc::clone(&self.binder),
                self.config.clone(),
                Arc::clone(&self.shared),
            ),
            user_store: Arc::clone(&self.user_store),
            opponent: OpponentConnector::new(Arc::clone(&self.peer_connector)),
            opponent_address: String::new(),
            is_host: false,
        };
        match thread::Builder::new()
            .name("matchmaking".to_string())
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.state.set(ProcessState::ErrorEncountered);
                Err(MatchmakingError::transport(format!(
                    "failed to spawn matchmaking worker: {e}"
                )))
            }
        }
    }

    pub fn state(&self) -> ProcessState {
        self.shared.state.get()
    }

    pub fn is_searching(&self) -> bool {
        self.shared.state.get().is_searching()
    }

    /// Id of the live ticket, or an empty string when no ticket is held.
    pub fn ticket_id(&self) -> String {
        self.shared.ticket_id()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Take ownership of the established peer connection. One-shot: the
    /// first call after `ConnectionSuccess` returns the connection, every
    /// later call returns `None`.
    pub fn take_peer_connection(&self) -> Option<Box<dyn PeerConnection>> {
        self.shared.take_peer()
    }

    /// Cancel the search and join the worker thread. The worker observes
    /// the forced `ErrorEncountered` state at its next bounded-wait check.
    pub fn shutdown(&mut self) {
        self.shared.state.set(ProcessState::ErrorEncountered);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("[Matchmaking] Worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for MatchmakingSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The background half of a session: owns the server connection and the
/// pending peer connection, and drives all state transitions.
struct Worker {
    config: SessionConfig,
    shared: Arc<SessionShared>,
    conn: ConnectionManager,
    user_store: Arc<dyn UserStore>,
    opponent: OpponentConnector,
    opponent_address: String,
    is_host: bool,
}

impl Worker {
    fn run(mut self) {
        while self.shared.state.get().is_searching() {
            match self.shared.state.get() {
                ProcessState::Initializing => self.start_matchmaking(),
                ProcessState::Matchmaking => self.handle_matchmaking(),
                ProcessState::OpponentConnecting => self.handle_connecting(),
                _ => break,
            }
        }
        // Release the server connection on every exit path, including
        // cancellation mid-cycle.
        self.conn.teardown();
        debug!("[Matchmaking] Worker finished in state {:?}", self.shared.state.get());
    }

    fn fail(&self, error: &MatchmakingError) {
        error!("[Matchmaking] Search terminated: {error}");
        self.shared.state.set(ProcessState::ErrorEncountered);
    }

    /// Sleep `total` in slices, bailing out early when the session leaves
    /// the searching set. Returns whether the search is still live.
    fn sleep_while_searching(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if !self.shared.state.get().is_searching() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_SLICE));
        }
    }

    /// `Initializing`: reach the server and queue up with a fresh ticket.
    fn start_matchmaking(&mut self) {
        self.shared.set_ticket("");

        if let Err(e) = self.conn.connect() {
            self.fail(&e);
            return;
        }

        let created = TicketClient::new(&mut self.conn, self.user_store.as_ref()).create_ticket();
        match created {
            Ok(ticket_id) => {
                self.shared.set_ticket(&ticket_id);
                if self
                    .shared
                    .state
                    .transition(ProcessState::Initializing, ProcessState::Matchmaking)
                {
                    info!("[Matchmaking] Trying to find match...");
                }
            }
            Err(e) => self.fail(&e),
        }
    }

    /// `Matchmaking`: poll the ticket once per interval until assigned.
    fn handle_matchmaking(&mut self) {
        if !self.sleep_while_searching(self.config.poll_interval) {
            return;
        }
        // Teardown may have been requested during the sleep.
        if self.shared.state.get() != ProcessState::Matchmaking {
            return;
        }

        let ticket_id = self.shared.ticket_id();
        let polled =
            TicketClient::new(&mut self.conn, self.user_store.as_ref()).poll_ticket(&ticket_id);
        match polled {
            Ok(TicketStatus::Pending) => {}
            Ok(TicketStatus::Assigned { opponent, is_host }) => {
                // Best-effort cleanup; failures are logged inside and must
                // never block the hand-off.
                TicketClient::new(&mut self.conn, self.user_store.as_ref())
                    .delete_ticket(&ticket_id);
                self.shared.set_ticket("");

                self.opponent_address = opponent;
                self.is_host = is_host;

                // The server connection is done. The local port has to be
                // free before the peer connection takes it over.
                self.conn.teardown();

                if self
                    .shared
                    .state
                    .transition(ProcessState::Matchmaking, ProcessState::OpponentConnecting)
                {
                    info!(
                        "[Matchmaking] Opponent found. Address: {}, isHost: {}",
                        self.opponent_address, self.is_host
                    );
                }
            }
            Err(e) => self.fail(&e),
        }
    }

    /// `OpponentConnecting`: drive the peer connection to success, failure,
    /// or another poll interval.
    fn handle_connecting(&mut self) {
        let progress =
            self.opponent
                .drive(&self.opponent_address, self.is_host, self.config.local_port);
        match progress {
            Ok(ConnectProgress::InProgress) => {
                debug!("[Matchmaking] Connection not yet successful");
                self.sleep_while_searching(self.config.poll_interval);
            }
            Ok(ConnectProgress::Failed) => {
                // Back to the start for a new ticket and, hopefully, an
                // opponent we can actually reach.
                warn!("[Matchmaking] Connection to opponent failed, searching again");
                self.shared
                    .state
                    .transition(ProcessState::OpponentConnecting, ProcessState::Initializing);
            }
            Ok(ConnectProgress::Succeeded(peer)) => {
                self.shared.put_peer(peer);
                if self
                    .shared
                    .state
                    .transition(ProcessState::OpponentConnecting, ProcessState::ConnectionSuccess)
                {
                    info!("[Matchmaking] Connection to opponent successful");
                } else {
                    // Cancelled while publishing; drop the connection again.
                    let _ = self.shared.take_peer();
                }
            }
            Err(e) => self.fail(&e),
        }
    }
}
