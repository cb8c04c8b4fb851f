//! Domain entities for the chat relay.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: who is connected, which id each connection was given, and
//! what has been said so far.
//!
//! None of these types synchronise internally.  The relay keeps the registry
//! and the history behind one lock so that registration, lookup, removal, and
//! appends never interleave.

/// Monotonic session id allocation.
pub mod ids;

/// Append-only chat history.
pub mod history;

/// Connection → session table.
pub mod registry;

/// Session identity types.
pub mod session;

pub use history::HistoryLog;
pub use ids::IdAllocator;
pub use registry::{RegistryError, SessionRegistry};
pub use session::{ConnectionId, Session, DEFAULT_HUE, DEFAULT_NICK};
