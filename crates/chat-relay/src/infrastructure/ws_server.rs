//! WebSocket server: accept loop, per-peer outbound queues, and per-session
//! task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections and upgrading each to WebSocket.
//! 3. Giving every connection a bounded outbound queue in the [`PeerTable`],
//!    which is the [`FrameSink`] the dispatcher broadcasts through.
//! 4. Running two halves per session:
//!    - **Writer task**: drains the outbound queue into binary WebSocket frames.
//!    - **Reader loop**: turns inbound text frames into `on_message` calls.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Back-pressure
//!
//! The dispatcher enqueues frames with `try_send`, so a peer that stops
//! reading only fills its own queue.  Once the queue is full, further frames
//! for that peer are dropped and logged; everyone else keeps receiving.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use chat_core::ConnectionId;

use crate::application::{BroadcastDispatcher, FrameSink, SendError};
use crate::domain::RelayConfig;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Peer table ────────────────────────────────────────────────────────────────

/// Outbound queues for every attached connection.
///
/// Implements [`FrameSink`] for the dispatcher: `send` copies the frame into
/// the peer's bounded queue without waiting.
#[derive(Debug)]
pub struct PeerTable {
    queues: Mutex<HashMap<ConnectionId, mpsc::Sender<Vec<u8>>>>,
    capacity: usize,
}

impl PeerTable {
    /// Creates an empty table whose queues hold `capacity` frames each.
    ///
    /// A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Creates the outbound queue for `connection` and returns its receiving
    /// end.  Re-attaching replaces the previous queue.
    pub fn attach(&self, connection: ConnectionId) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.lock().insert(connection, tx);
        rx
    }

    /// Drops the queue for `connection`.  The writer task sees the channel
    /// close once it has drained what was already queued.
    pub fn detach(&self, connection: &ConnectionId) {
        self.lock().remove(connection);
    }

    /// Number of attached connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no connection is attached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, mpsc::Sender<Vec<u8>>>> {
        // The map stays consistent even if a holder panicked mid-insert.
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameSink for PeerTable {
    fn send(&self, connection: ConnectionId, frame: &[u8]) -> Result<(), SendError> {
        let queues = self.lock();
        let tx = queues
            .get(&connection)
            .ok_or(SendError::NotAttached(connection))?;
        tx.try_send(frame.to_vec()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull(connection),
            TrySendError::Closed(_) => SendError::Closed(connection),
        })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and runs [`serve`] until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "chat relay listening");
    serve(listener, config, running).await
}

/// Runs the accept loop on an already-bound listener until `running` is set
/// to `false`.
///
/// Each accepted connection gets its own Tokio task; one slow client never
/// blocks the loop.  Tests bind to port 0 and call this directly.
///
/// # Errors
///
/// Currently always returns `Ok(())`; accept errors are logged and skipped.
pub async fn serve(
    listener: TcpListener,
    config: RelayConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let peers = Arc::new(PeerTable::new(config.outbound_queue));
    let dispatcher = Arc::new(BroadcastDispatcher::new(peers.clone()));
    let ctx = Arc::new(RelayContext {
        config,
        peers,
        dispatcher,
    });

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!(%peer_addr, "TCP connection accepted");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g. too many open files); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// State shared by every session task of one server.
struct RelayContext {
    config: RelayConfig,
    peers: Arc<PeerTable>,
    dispatcher: Arc<BroadcastDispatcher>,
}

async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<RelayContext>) {
    match run_session(stream, peer_addr, ctx).await {
        Ok(()) => debug!(%peer_addr, "session closed normally"),
        Err(e) => warn!(%peer_addr, "session closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one client connection.
///
/// 1. Completes the WebSocket handshake.
/// 2. Attaches an outbound queue and registers the session, which enqueues
///    the history snapshot.
/// 3. Spawns the writer task and runs the reader loop until the client goes
///    away.
/// 4. Unregisters the session and detaches the queue, so the writer drains
///    and exits.
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<RelayContext>,
) -> anyhow::Result<()> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(ctx.config.max_message_size);
    let ws_stream = accept_async_with_config(stream, Some(ws_config))
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let connection = ConnectionId::new();
    let mut outbound = ctx.peers.attach(connection);
    let session = match ctx.dispatcher.on_connect(connection).await {
        Ok(session) => session,
        Err(e) => {
            ctx.peers.detach(&connection);
            return Err(e).with_context(|| format!("could not register {peer_addr}"));
        }
    };
    info!(%peer_addr, session_id = session.id, %connection, "client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = ws_tx.send(WsMessage::Binary(frame)).await {
                debug!(%connection, "write failed, stopping writer: {e}");
                return;
            }
        }
        // Best effort; the peer may already be gone.
        let _ = ws_tx.close().await;
    });

    let result = read_messages(&mut ws_rx, connection, &ctx.dispatcher).await;

    ctx.dispatcher.on_disconnect(connection).await;
    ctx.peers.detach(&connection);
    if let Err(e) = writer.await {
        warn!(%connection, "writer task failed: {e}");
    }
    info!(%peer_addr, session_id = session.id, "client disconnected");

    result
}

/// Reads inbound WebSocket messages until the client closes.
///
/// Text frames are chat content.  Binary frames are accepted when they are
/// valid UTF-8 and ignored otherwise.
async fn read_messages(
    ws_rx: &mut SplitStream<WebSocketStream<TcpStream>>,
    connection: ConnectionId,
    dispatcher: &BroadcastDispatcher,
) -> anyhow::Result<()> {
    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(WsMessage::Text(text)) => relay(dispatcher, connection, text).await,
            Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => relay(dispatcher, connection, text).await,
                Err(e) => warn!(%connection, "ignoring non-UTF-8 binary message: {e}"),
            },
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                debug!(%connection, "control frame received");
            }
            Ok(WsMessage::Close(frame)) => {
                debug!(%connection, ?frame, "close frame received");
                break;
            }
            Ok(WsMessage::Frame(_)) => {}
            Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => break,
            Err(e) => return Err(e).context("WebSocket read failed"),
        }
    }
    Ok(())
}

async fn relay(dispatcher: &BroadcastDispatcher, connection: ConnectionId, content: String) {
    // Failures are already logged by the dispatcher; the session stays open.
    if let Err(e) = dispatcher.on_message(connection, content).await {
        debug!(%connection, "message not relayed: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delivers_frame_to_attached_queue() {
        // Arrange
        let table = PeerTable::new(4);
        let conn = ConnectionId::new();
        let mut rx = table.attach(conn);

        // Act
        table.send(conn, &[0x03]).unwrap();

        // Assert
        assert_eq!(rx.recv().await, Some(vec![0x03]));
    }

    #[test]
    fn test_send_to_unattached_connection_fails() {
        let table = PeerTable::new(4);
        let conn = ConnectionId::new();

        assert_eq!(table.send(conn, b"x"), Err(SendError::NotAttached(conn)));
    }

    #[test]
    fn test_full_queue_reports_queue_full() {
        // Arrange: capacity one, nobody reading
        let table = PeerTable::new(1);
        let conn = ConnectionId::new();
        let _rx = table.attach(conn);
        table.send(conn, b"first").unwrap();

        // Act
        let result = table.send(conn, b"second");

        // Assert
        assert_eq!(result, Err(SendError::QueueFull(conn)));
    }

    #[test]
    fn test_dropped_receiver_reports_closed() {
        let table = PeerTable::new(4);
        let conn = ConnectionId::new();
        drop(table.attach(conn));

        assert_eq!(table.send(conn, b"x"), Err(SendError::Closed(conn)));
    }

    #[tokio::test]
    async fn test_detach_closes_queue_after_drain() {
        let table = PeerTable::new(4);
        let conn = ConnectionId::new();
        let mut rx = table.attach(conn);
        table.send(conn, b"last").unwrap();

        table.detach(&conn);

        assert!(table.is_empty());
        assert_eq!(rx.recv().await, Some(b"last".to_vec()));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_full_queue_of_one_peer_does_not_affect_another() {
        let table = PeerTable::new(1);
        let slow = ConnectionId::new();
        let fast = ConnectionId::new();
        let _slow_rx = table.attach(slow);
        let mut fast_rx = table.attach(fast);
        table.send(slow, b"a").unwrap();

        assert!(table.send(slow, b"b").is_err());
        assert!(table.send(fast, b"b").is_ok());
        assert_eq!(fast_rx.try_recv().unwrap(), b"b".to_vec());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let table = PeerTable::new(0);
        let conn = ConnectionId::new();
        let _rx = table.attach(conn);

        assert!(table.send(conn, b"x").is_ok());
    }
}
