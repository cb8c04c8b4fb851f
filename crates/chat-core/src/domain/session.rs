//! Session identity types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::messages::Sender;

/// Nickname given to every new session.
pub const DEFAULT_NICK: &str = "Anonymous";

/// Hue given to every new session (green).
pub const DEFAULT_HUE: u16 = 120;

/// Opaque identity of one transport connection.
///
/// Minted by the transport when a connection is accepted and used by the
/// core only as a lookup key; the core never owns the connection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a fresh random connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relay-side record for one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: u16,
    pub hue: u16,
    pub nick: String,
    pub connection: ConnectionId,
}

impl Session {
    /// Creates a session with the default nick and hue.
    pub fn new(id: u16, connection: ConnectionId) -> Self {
        Self {
            id,
            hue: DEFAULT_HUE,
            nick: DEFAULT_NICK.to_string(),
            connection,
        }
    }

    /// Captures the current identity as an immutable [`Sender`] snapshot.
    pub fn sender(&self) -> Sender {
        Sender {
            id: self.id,
            hue: self.hue,
            nick: self.nick.clone(),
        }
    }
}
