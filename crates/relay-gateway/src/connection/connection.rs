//! Individual WebSocket connection
//!
//! The shared handle to one connection: its outbound queue and its close signal.
//! The socket itself is owned by the connection's pump.

use crate::events::Event;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Unique identifier of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A single WebSocket connection
pub struct Connection {
    id: ConnectionId,

    /// Peer address, when the listener provides it
    remote_addr: Option<SocketAddr>,

    /// Bounded queue drained by the connection's write loop
    sender: mpsc::Sender<Event>,

    /// Fired once when the connection is closed
    shutdown: CancellationToken,

    closed: AtomicBool,

    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(remote_addr: Option<SocketAddr>, sender: mpsc::Sender<Event>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::generate(),
            remote_addr,
            sender,
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            created_at: Instant::now(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Enqueue an event without waiting
    pub fn try_send(&self, event: Event) -> Result<(), mpsc::error::TrySendError<Event>> {
        self.sender.try_send(event)
    }

    /// Close the connection
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the connection has been closed
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    /// Get connection age
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
