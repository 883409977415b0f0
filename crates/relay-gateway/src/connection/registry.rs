//! Connection registry
//!
//! The single source of truth for which connections are live, and the fan-out
//! point for broadcasts.
//!
//! Membership lives in one `HashMap` behind one `RwLock`. Insert and remove take
//! the write lock; broadcast iterates under the read lock, so it always sees a
//! consistent set of members and never races a half-removed connection.

use super::{Connection, ConnectionId};
use crate::error::GatewayError;
use crate::events::Event;
use crate::handlers::{EventRouter, RouteOutcome};
use parking_lot::RwLock;
use relay_common::SlowConsumerPolicy;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Outcome of a broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the event was enqueued for
    pub delivered: usize,
    /// Connections that missed the event (queue full or already closing)
    pub dropped: usize,
    /// Slow connections disconnected under [`SlowConsumerPolicy::Disconnect`]
    pub disconnected: usize,
}

/// Tracks all live connections
pub struct Registry {
    clients: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    router: EventRouter,
    slow_consumer: SlowConsumerPolicy,
}

impl Registry {
    /// Create an empty registry dispatching through `router`
    #[must_use]
    pub fn new(router: EventRouter, slow_consumer: SlowConsumerPolicy) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            router,
            slow_consumer,
        }
    }

    /// Create an empty registry with the built-in handlers, wrapped in Arc
    #[must_use]
    pub fn new_shared(slow_consumer: SlowConsumerPolicy) -> Arc<Self> {
        Arc::new(Self::new(EventRouter::with_default_handlers(), slow_consumer))
    }

    /// Create and register a connection with an outbound queue of `buffer` events
    ///
    /// Returns the connection and the receiving end of its queue, which belongs
    /// to the connection's write loop.
    pub fn connect(
        &self,
        remote_addr: Option<SocketAddr>,
        buffer: usize,
    ) -> (Arc<Connection>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        let connection = Connection::new(remote_addr, tx);
        self.add_client(connection.clone());
        (connection, rx)
    }

    /// Register a connection
    pub fn add_client(&self, connection: Arc<Connection>) {
        let id = connection.id();
        let count = {
            let mut clients = self.clients.write();
            clients.insert(id, connection);
            clients.len()
        };

        tracing::debug!(connection_id = %id, connections = count, "Connection added");
    }

    /// Deregister and close a connection
    ///
    /// Idempotent: returns `true` only for the call that removed it. Both of a
    /// connection's loops call this on exit.
    pub fn remove_client(&self, id: ConnectionId) -> bool {
        let removed = self.clients.write().remove(&id);

        match removed {
            Some(connection) => {
                connection.close();
                tracing::info!(
                    connection_id = %id,
                    remote_addr = ?connection.remote_addr(),
                    "Connection closed"
                );
                true
            }
            None => false,
        }
    }

    /// Dispatch an inbound event
    ///
    /// Handler failures are logged and go no further: they never close the
    /// originating connection or touch any other.
    pub fn route_message(&self, event: &Event, origin: &Connection) {
        match self.router.route(self, event, origin) {
            Ok(RouteOutcome::Handled) => {}
            Ok(RouteOutcome::Ignored) => {
                tracing::trace!(
                    connection_id = %origin.id(),
                    event_type = %event.event_type(),
                    "No handler for event type"
                );
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %origin.id(),
                    event_type = %event.event_type(),
                    error = %GatewayError::Handler(e),
                    "Handler error"
                );
            }
        }
    }

    /// Enqueue `event` on every registered connection
    ///
    /// Never waits on a peer. A full queue costs that peer the event, or its
    /// connection under [`SlowConsumerPolicy::Disconnect`].
    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut slow = Vec::new();

        {
            let clients = self.clients.read();

            for (id, connection) in clients.iter() {
                match connection.try_send(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(connection_id = %id, "Outbound queue full");
                        match self.slow_consumer {
                            SlowConsumerPolicy::Drop => report.dropped += 1,
                            SlowConsumerPolicy::Disconnect => slow.push(*id),
                        }
                    }
                    Err(TrySendError::Closed(_)) => report.dropped += 1,
                }
            }
        }

        // Removal takes the write lock, so it has to wait until iteration is done.
        for id in slow {
            if self.remove_client(id) {
                report.disconnected += 1;
            }
        }

        tracing::trace!(
            event_type = %event.event_type(),
            delivered = report.delivered,
            dropped = report.dropped,
            disconnected = report.disconnected,
            "Broadcast complete"
        );

        report
    }

    /// Close every connection (shutdown)
    ///
    /// Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = self.clients.write().drain().map(|(_, c)| c).collect();

        for connection in &drained {
            connection.close();
        }

        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Closed all connections");
        }

        drained.len()
    }

    /// Get a connection by id
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.clients.read().get(&id).cloned()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.read().contains_key(&id)
    }

    /// Get the total number of active connections
    pub fn connection_count(&self) -> usize {
        self.clients.read().len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("connections", &self.connection_count())
            .field("router", &self.router)
            .field("slow_consumer", &self.slow_consumer)
            .finish()
    }
}
