//! BroadcastDispatcher: turns connection events into outgoing frames.
//!
//! ```text
//! on_connect(c)     → register c → snapshot frame → c only
//! on_message(c, m)  → lookup c → entry → append → single frame → every session
//! on_disconnect(c)  → remove c
//! ```
//!
//! The registry, the id counter, and the history form one shared resource
//! guarded by a single async mutex, so registration, lookup, removal, and
//! appends never interleave.  Frames are encoded and handed to the
//! [`FrameSink`] while the lock is held; the sink only enqueues, and the
//! socket writes happen later on per-connection tasks.  Enqueueing inside
//! the lock is what guarantees that every peer sees broadcasts in history
//! order and that a newcomer's snapshot precedes any broadcast to it.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use chat_core::protocol::messages::HUE_RANGE;
use chat_core::{
    encode_single, encode_snapshot, ChatEntry, ConnectionId, HistoryLog, ProtocolError,
    RegistryError, Session, SessionRegistry,
};

// ── Error types ───────────────────────────────────────────────────────────────

/// A frame could not be handed to one specific peer.
///
/// Always recovered locally: the peer is skipped and the broadcast goes on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The peer's outbound queue is full (slow reader).
    #[error("outbound queue for {0} is full")]
    QueueFull(ConnectionId),

    /// The peer's writer has shut down.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The transport has no outbound queue for this connection.
    #[error("connection {0} has no outbound queue")]
    NotAttached(ConnectionId),
}

/// Errors returned by dispatcher operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Registry lifecycle failure, including `UnknownSession`.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A frame could not be encoded (oversized field).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

// ── Outbound seam ─────────────────────────────────────────────────────────────

/// Outbound half of the transport: delivers one encoded frame to one peer.
///
/// Implementations must not block on network I/O.  They are called while the
/// dispatcher's state lock is held and are expected to enqueue the frame for
/// a writer task and return immediately.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSink: Send + Sync {
    /// Enqueues `frame` for `connection`.
    fn send(&self, connection: ConnectionId, frame: &[u8]) -> Result<(), SendError>;
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Outcome of one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// The entry appended to history and broadcast.
    pub entry: ChatEntry,
    /// Number of peers the frame was handed to.
    pub delivered: usize,
    /// Peers whose send failed and were skipped.
    pub failed: Vec<ConnectionId>,
}

#[derive(Debug, Default)]
struct RelayState {
    registry: SessionRegistry,
    history: HistoryLog,
}

/// Session lifecycle and fan-out engine.
///
/// Share one instance across all connection tasks with `Arc`.
pub struct BroadcastDispatcher {
    state: Mutex<RelayState>,
    sink: Arc<dyn FrameSink>,
}

impl BroadcastDispatcher {
    /// Creates a dispatcher with an empty registry and history.
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            state: Mutex::new(RelayState::default()),
            sink,
        }
    }

    /// Registers a new connection and sends it the history snapshot.
    ///
    /// Exactly one snapshot frame is sent, to the new connection only, before
    /// any broadcast can reach it.  A failed snapshot send is logged; the
    /// session stays registered.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Registry`] if the connection is already
    /// registered or the id space is exhausted.
    pub async fn on_connect(&self, connection: ConnectionId) -> Result<Session, DispatchError> {
        let mut state = self.state.lock().await;
        let session = state.registry.register(connection)?;

        let frame = match encode_snapshot(state.history.snapshot_all()) {
            Ok(frame) => frame,
            Err(e) => {
                state.registry.remove(&connection);
                return Err(e.into());
            }
        };

        if let Err(e) = self.sink.send(connection, &frame) {
            warn!(%connection, error = %e, "failed to send join snapshot");
        }

        info!(
            session_id = session.id,
            %connection,
            history = state.history.len(),
            snapshot_bytes = frame.len(),
            "session joined"
        );
        Ok(session)
    }

    /// Accepts a chat message and broadcasts it to every live session,
    /// including the sender.
    ///
    /// A send failure to one peer is logged and skipped; it never aborts the
    /// broadcast.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownSession`] if the connection is not
    ///   registered.  The message is dropped and nothing is broadcast.
    /// - [`ProtocolError::FieldTooLong`] if the content cannot be framed.  The
    ///   message never enters history.
    pub async fn on_message(
        &self,
        connection: ConnectionId,
        content: impl Into<String>,
    ) -> Result<BroadcastReport, DispatchError> {
        let mut state = self.state.lock().await;

        let sender = match state.registry.lookup(&connection) {
            Ok(session) => session.sender(),
            Err(e) => {
                error!(%connection, "message from unregistered connection dropped");
                return Err(e.into());
            }
        };

        let entry = ChatEntry::new(sender, content);
        let frame = match encode_single(&entry) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%connection, error = %e, "message rejected");
                return Err(e.into());
            }
        };
        state.history.append(entry.clone());

        let mut delivered = 0;
        let mut failed = Vec::new();
        for peer in state.registry.connections() {
            match self.sink.send(peer, &frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(%peer, error = %e, "broadcast send failed; skipping peer");
                    failed.push(peer);
                }
            }
        }

        debug!(
            session_id = entry.sender.id,
            delivered,
            failed = failed.len(),
            frame_bytes = frame.len(),
            "message broadcast"
        );
        Ok(BroadcastReport {
            entry,
            delivered,
            failed,
        })
    }

    /// Removes the session for `connection`.
    ///
    /// Idempotent: an unknown or already-removed connection is a no-op.
    pub async fn on_disconnect(&self, connection: ConnectionId) -> Option<Session> {
        let removed = self.state.lock().await.registry.remove(&connection);
        match &removed {
            Some(session) => info!(session_id = session.id, %connection, "session left"),
            None => debug!(%connection, "disconnect for unknown connection ignored"),
        }
        removed
    }

    /// Updates the nick and/or hue of a live session.
    ///
    /// Both values are validated before either is applied.  Entries already
    /// in history keep the identity they were recorded with.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Registry`] for an unknown connection, an
    /// out-of-range hue, or an oversized nick.
    pub async fn update_profile(
        &self,
        connection: ConnectionId,
        nick: Option<String>,
        hue: Option<u16>,
    ) -> Result<Session, DispatchError> {
        if let Some(hue) = hue.filter(|h| *h >= HUE_RANGE) {
            return Err(RegistryError::InvalidHue(hue).into());
        }

        let mut state = self.state.lock().await;
        state.registry.lookup(&connection)?;
        if let Some(nick) = nick {
            state.registry.set_nick(&connection, nick)?;
        }
        if let Some(hue) = hue {
            state.registry.set_hue(&connection, hue)?;
        }
        Ok(state.registry.lookup(&connection)?.clone())
    }

    /// Returns the number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    /// Returns the number of entries in history.
    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
