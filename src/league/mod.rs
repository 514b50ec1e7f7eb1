//! The tournament coordination engine: message envelope and error
//! model, auth, scheduling, the pluggable game module, repository
//! contracts, the HTTP transport, and the three agent state machines.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod game;
pub mod league_manager;
pub mod player;
pub mod referee;
pub mod repository;
pub mod scheduler;
pub mod server;
pub mod transport;

/// Current UTC timestamp in the ISO-8601 `Z`-suffixed form every
/// envelope's `timestamp` field requires.
pub fn now_utc_string() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
