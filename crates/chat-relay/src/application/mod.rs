//! Application layer for chat-relay.
//!
//! The application layer orchestrates the chat logic: it knows *what* to do
//! when a client joins, speaks, or leaves, but delegates *how* bytes reach a
//! client to the infrastructure layer through the [`FrameSink`] trait.
//!
//! # Responsibilities
//!
//! - Owning the session registry and history behind one exclusion scope
//! - Building the join snapshot and broadcast frames
//! - Fanning a frame out to every live session, tolerating per-peer failures
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod dispatcher;

pub use dispatcher::{BroadcastDispatcher, BroadcastReport, DispatchError, FrameSink, SendError};
