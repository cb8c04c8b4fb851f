//! # chat-core
//!
//! Shared library for the chat relay containing the binary frame codec, the
//! chat entry types, the session registry, and the in-memory history log.
//!
//! It has zero dependencies on async runtimes, sockets, or terminals; the
//! relay binary (`chat-relay`) supplies the transport.
//!
//! # Architecture overview
//!
//! Clients hold a persistent WebSocket connection to the relay.  Each
//! connection is given an anonymous identity (numeric id, nickname, colour
//! hue).  Every text message a client sends is stamped with a snapshot of
//! that identity, appended to the history, and fanned out to every connected
//! client as a binary frame.  A newly joined client first receives the whole
//! history as one snapshot frame.
//!
//! This crate defines:
//!
//! - **`protocol`** – How chat entries travel over the wire.  Two frame kinds
//!   (snapshot and single entry) share one little-endian entry layout.
//!
//! - **`domain`** – The session registry (who is connected, which id they
//!   were given) and the append-only history log.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `chat_core::ChatEntry` instead of `chat_core::protocol::messages::ChatEntry`.
pub use domain::history::HistoryLog;
pub use domain::registry::{RegistryError, SessionRegistry};
pub use domain::session::{ConnectionId, Session, DEFAULT_HUE, DEFAULT_NICK};
pub use protocol::codec::{
    decode_entry, decode_frame, decode_single, decode_snapshot, encode_entry, encode_single,
    encode_snapshot, ProtocolError,
};
pub use protocol::messages::{ChatEntry, Frame, Sender};
