//! User/session store collaborator.
//!
//! The engine only needs to know whether a user is logged in and, if so,
//! which credentials to attach to a ticket request. Account management
//! lives elsewhere.

/// Credentials attached to a `create-ticket` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: String,
    pub play_key: String,
}

/// Read-only view of the login state and credentials of the local user.
pub trait UserStore: Send + Sync {
    fn is_logged_in(&self) -> bool;
    fn user_info(&self) -> UserInfo;
}
