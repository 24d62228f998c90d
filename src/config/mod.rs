/// Main configuration module.
///
/// Re-exports the matchmaking protocol constants and session configuration.
pub mod matchmaking;

pub use matchmaking::SessionConfig;
