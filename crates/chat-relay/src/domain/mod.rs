//! Domain layer for chat-relay.
//!
//! Holds the relay's runtime configuration.  The chat entities themselves
//! (sessions, entries, frames) live in `chat-core` so that clients can share
//! them.

pub mod config;

pub use config::{ConfigError, RelayConfig};
