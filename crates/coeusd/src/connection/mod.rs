//! Live-update connections and their I/O pumps.
//!
//! A connection is one accepted bidirectional message stream. It is split
//! into two halves, each driven by its own task:
//!
//! ```text
//!   RegistryActor ──try_send──▶ [outbound queue] ──▶ outbound pump ──▶ transport
//!                                                                        │
//!   (discarded) ◀── validate ◀── inbound pump ◀──────────────────────────┘
//! ```
//!
//! The owner (the code that registered the connection) waits on a
//! [`ShutdownLatch`] until *both* pumps have finished, and only then removes
//! the connection from the registry. When either pump stops it cancels the
//! shared close token so the other one follows.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Transport errors are logged and end the connection gracefully

mod pumps;
mod shutdown;

pub use shutdown::{Completion, ShutdownLatch};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, Stream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use coeus_core::ClassSessionId;

use crate::registry::{RegistryError, RegistryHandle, Scope};

/// Default outbound queue capacity. One slot: a client that is still busy
/// writing the previous message when the next one arrives is evicted.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1;

/// Idle read timeout. Clients answer keepalive pings, so silence this long
/// means the peer is gone.
pub const READ_TIMEOUT: Duration = Duration::from_secs(75);

/// Write timeout for a single frame
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between keepalive pings
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// A serialized envelope, shared by every connection it is fanned out to.
pub type Payload = Arc<str>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next connection id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Transport-neutral WebSocket frame.
///
/// The HTTP layer converts its own message type to and from this, which
/// keeps the pumps testable over in-memory channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Outcome of a non-blocking enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload is queued for the outbound pump
    Delivered,
    /// The queue is full: the consumer is not keeping up
    Full,
    /// The consumer is gone
    Closed,
}

/// Producer side of a connection's outbound queue.
///
/// This is what the registry stores for each registered connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    id: ConnectionId,
    sender: mpsc::Sender<Payload>,
    closer: CancellationToken,
}

impl Outbound {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Attempts to enqueue `payload` without waiting.
    pub fn try_deliver(&self, payload: &Payload) -> Delivery {
        if self.closer.is_cancelled() {
            return Delivery::Closed;
        }
        match self.sender.try_send(Arc::clone(payload)) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Closes the queue. The outbound pump stops at its next wakeup and the
    /// rest of the connection is torn down after it.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }
}

/// Consumer side of a connection's outbound queue (owned by the outbound pump).
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::Receiver<Payload>,
    closer: CancellationToken,
}

impl OutboundQueue {
    /// Waits for the next payload. Returns `None` once the queue is closed;
    /// payloads still buffered at that point are dropped.
    pub async fn next(&mut self) -> Option<Payload> {
        tokio::select! {
            biased;
            _ = self.closer.cancelled() => None,
            payload = self.receiver.recv() => payload,
        }
    }

    /// Takes a buffered payload without waiting.
    pub fn try_next(&mut self) -> Option<Payload> {
        if self.closer.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Whether the queue has been closed by either side.
    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Token shared by both halves; cancelling it ends the connection.
    pub fn closer(&self) -> CancellationToken {
        self.closer.clone()
    }
}

/// Creates a connection's outbound queue with a fresh connection id.
///
/// A capacity of zero is raised to one (tokio channels need a slot).
pub fn outbound_channel(capacity: usize) -> (Outbound, OutboundQueue) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let closer = CancellationToken::new();
    (
        Outbound {
            id: ConnectionId::next(),
            sender,
            closer: closer.clone(),
        },
        OutboundQueue { receiver, closer },
    )
}

/// Per-connection tuning, derived from the daemon configuration.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub outbound_capacity: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub ping_interval: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            ping_interval: PING_INTERVAL,
        }
    }
}

/// Errors that end a connection before its pumps start.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection {id} could not be registered in {scope}: {source}")]
    Registration {
        id: ConnectionId,
        scope: Scope,
        #[source]
        source: RegistryError,
    },
}

/// Accepts an upgraded stream into the global scope.
///
/// Returns once the connection has fully closed.
pub async fn accept_global<Si, St, E>(
    registry: RegistryHandle,
    sink: Si,
    stream: St,
    settings: ConnectionSettings,
) -> Result<ConnectionId, ConnectionError>
where
    Si: Sink<Frame> + Unpin + Send + 'static,
    Si::Error: fmt::Display + Send,
    St: Stream<Item = Result<Frame, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    serve_connection(registry, Scope::Global, sink, stream, settings).await
}

/// Accepts an upgraded stream into one class session's scope.
///
/// Returns once the connection has fully closed.
pub async fn accept_session<Si, St, E>(
    registry: RegistryHandle,
    class_session: ClassSessionId,
    sink: Si,
    stream: St,
    settings: ConnectionSettings,
) -> Result<ConnectionId, ConnectionError>
where
    Si: Sink<Frame> + Unpin + Send + 'static,
    Si::Error: fmt::Display + Send,
    St: Stream<Item = Result<Frame, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    serve_connection(registry, Scope::Session(class_session), sink, stream, settings).await
}

/// Registers a connection, runs both pumps, and unregisters it once both
/// have finished.
pub async fn serve_connection<Si, St, E>(
    registry: RegistryHandle,
    scope: Scope,
    sink: Si,
    stream: St,
    settings: ConnectionSettings,
) -> Result<ConnectionId, ConnectionError>
where
    Si: Sink<Frame> + Unpin + Send + 'static,
    Si::Error: fmt::Display + Send,
    St: Stream<Item = Result<Frame, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let (outbound, queue) = outbound_channel(settings.outbound_capacity);
    let id = outbound.id();
    let closer = queue.closer();

    registry
        .register(scope, outbound)
        .await
        .map_err(|source| ConnectionError::Registration { id, scope, source })?;

    info!(connection = %id, scope = %scope, "Live connection opened");

    let (mut latch, outbound_done, inbound_done) = ShutdownLatch::pair();

    tokio::spawn(pumps::outbound_pump(
        id,
        queue,
        sink,
        settings.clone(),
        outbound_done,
    ));
    tokio::spawn(pumps::inbound_pump(
        id,
        stream,
        closer,
        settings.read_timeout,
        inbound_done,
    ));

    latch.wait().await;

    match registry.unregister(scope, id).await {
        Ok(true) => {}
        Ok(false) => debug!(connection = %id, "Connection was already evicted"),
        Err(e) => debug!(connection = %id, error = %e, "Registry gone during unregister"),
    }

    info!(connection = %id, scope = %scope, "Live connection closed");
    Ok(id)
}
