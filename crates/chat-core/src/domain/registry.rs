//! SessionRegistry: maps live connections to their chat identity.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::domain::ids::IdAllocator;
use crate::domain::session::{ConnectionId, Session};
use crate::protocol::messages::{HUE_RANGE, MAX_FIELD_LEN};

/// Error type for registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection was never registered or has already been removed.
    ///
    /// Messages only arrive between connect and disconnect, so this is a
    /// lifecycle bug in the caller, never a retryable condition.
    #[error("unknown session for connection {0}")]
    UnknownSession(ConnectionId),

    /// The connection already has a live session.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// Every 16-bit session id has been issued.
    #[error("session id space exhausted after {issued} registrations")]
    IdSpaceExhausted { issued: u32 },

    /// A hue outside `[0, 360)`.
    #[error("hue {0} is outside [0, 360)")]
    InvalidHue(u16),

    /// A nick that would not fit in a frame.
    #[error("nick is {len} bytes, maximum is {max}")]
    NickTooLong { len: usize, max: usize },
}

/// Owner of every [`Session`] record, keyed by [`ConnectionId`].
///
/// The registry does not lock internally; the caller provides exclusion.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, Session>,
    ids: IdAllocator,
}

impl SessionRegistry {
    /// Creates an empty registry whose first session id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection with the next session id and the default
    /// nick and hue.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if the connection is live
    /// and [`RegistryError::IdSpaceExhausted`] once all ids are used.
    pub fn register(&mut self, connection: ConnectionId) -> Result<Session, RegistryError> {
        if self.sessions.contains_key(&connection) {
            return Err(RegistryError::AlreadyRegistered(connection));
        }
        let id = self.ids.allocate().ok_or(RegistryError::IdSpaceExhausted {
            issued: self.ids.issued(),
        })?;

        let session = Session::new(id, connection);
        self.sessions.insert(connection, session.clone());
        debug!(session_id = id, %connection, "session registered");
        Ok(session)
    }

    /// Returns the session for `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownSession`] if it is not registered.
    pub fn lookup(&self, connection: &ConnectionId) -> Result<&Session, RegistryError> {
        self.sessions
            .get(connection)
            .ok_or(RegistryError::UnknownSession(*connection))
    }

    /// Removes the session for `connection`, returning it if it existed.
    ///
    /// Removing an unknown or already-removed connection is a no-op.
    pub fn remove(&mut self, connection: &ConnectionId) -> Option<Session> {
        let removed = self.sessions.remove(connection);
        if let Some(session) = &removed {
            debug!(session_id = session.id, %connection, "session removed");
        }
        removed
    }

    /// Changes the display name of a live session.
    ///
    /// History already recorded keeps the old name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NickTooLong`] or [`RegistryError::UnknownSession`].
    pub fn set_nick(
        &mut self,
        connection: &ConnectionId,
        nick: impl Into<String>,
    ) -> Result<&Session, RegistryError> {
        let nick = nick.into();
        if nick.len() > MAX_FIELD_LEN {
            return Err(RegistryError::NickTooLong {
                len: nick.len(),
                max: MAX_FIELD_LEN,
            });
        }
        let session = self.get_mut(connection)?;
        session.nick = nick;
        Ok(session)
    }

    /// Changes the colour hue of a live session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidHue`] or [`RegistryError::UnknownSession`].
    pub fn set_hue(&mut self, connection: &ConnectionId, hue: u16) -> Result<&Session, RegistryError> {
        if hue >= HUE_RANGE {
            return Err(RegistryError::InvalidHue(hue));
        }
        let session = self.get_mut(connection)?;
        session.hue = hue;
        Ok(session)
    }

    /// Returns the connections of every live session, in no particular order.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.sessions.keys().copied()
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn get_mut(&mut self, connection: &ConnectionId) -> Result<&mut Session, RegistryError> {
        self.sessions
            .get_mut(connection)
            .ok_or(RegistryError::UnknownSession(*connection))
    }
}
