//! chat-relay library crate.
//!
//! A real-time chat relay: every WebSocket client gets an anonymous session,
//! receives the chat history once on join, and every text message any client
//! sends is broadcast to all clients as a binary frame.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Clients (binary frames out, text frames in, over WebSocket)
//!         ↕
//! [chat-relay]
//!   ├── domain/           Pure types: RelayConfig
//!   ├── application/      BroadcastDispatcher: registry + history + fan-out
//!   └── infrastructure/
//!         └── ws_server/  WebSocket accept loop and per-peer queues
//!         ↕
//! [chat-core]             Frame codec, SessionRegistry, HistoryLog
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O beyond reading its own config file.
//! - `application` depends on `domain` and `chat-core`, and reaches the
//!   network only through the [`application::FrameSink`] trait.
//! - `infrastructure` depends on all other layers plus `tokio-tungstenite`.

/// Domain layer: configuration types.
pub mod domain;

/// Application layer: session lifecycle and broadcast fan-out.
pub mod application;

/// Infrastructure layer: WebSocket server.
pub mod infrastructure;
