//! Infrastructure layer for chat-relay.
//!
//! The infrastructure layer handles all I/O: accepting WebSocket connections
//! and moving encoded frames between sockets and the dispatcher.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade handshake
//! - Owning each client's bounded outbound queue ([`ws_server::PeerTable`])
//! - Spawning per-session reader/writer tasks
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Registry, history, or fan-out logic (that is the application layer)
//! - Frame encoding (that is `chat-core`)
//! - Configuration parsing (that is done in `main.rs`)

pub mod ws_server;

pub use ws_server::{run_server, serve, PeerTable};
