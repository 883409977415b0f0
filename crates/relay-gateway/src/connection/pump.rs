//! Connection pump
//!
//! Moves frames between one WebSocket and the rest of the relay. The read loop
//! decodes inbound frames and hands them to the registry; the write loop drains
//! the connection's outbound queue and sends heartbeats. Only the write loop
//! touches the sink, and every write it makes is bounded by the write deadline
//! so a peer that stops reading cannot pin the socket open.

use super::{Connection, Registry};
use crate::error::GatewayError;
use crate::events::Event;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use relay_common::RelayConfig;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};

/// Runs the read and write loops of a connection
#[derive(Clone)]
pub struct ConnectionPump {
    registry: Arc<Registry>,
    pong_wait: Duration,
    ping_interval: Duration,
    write_wait: Duration,
}

impl ConnectionPump {
    pub fn new(config: &RelayConfig, registry: Arc<Registry>) -> Self {
        Self {
            registry,
            pong_wait: config.pong_wait(),
            ping_interval: config.ping_interval(),
            write_wait: config.write_wait(),
        }
    }

    /// Pump an upgraded socket until the connection ends
    pub async fn run(
        &self,
        socket: WebSocket,
        connection: Arc<Connection>,
        outbound: mpsc::Receiver<Event>,
    ) {
        let (sink, stream) = socket.split();
        self.drive(stream, sink, connection, outbound).await;
    }

    /// Run both loops over an arbitrary frame stream and sink
    ///
    /// Returns once both loops have exited and the connection is deregistered.
    pub async fn drive<St, Si, E>(
        &self,
        stream: St,
        sink: Si,
        connection: Arc<Connection>,
        outbound: mpsc::Receiver<Event>,
    ) where
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
    {
        tokio::join!(
            self.read_loop(stream, &connection),
            self.write_loop(sink, &connection, outbound),
        );

        tracing::debug!(
            connection_id = %connection.id(),
            age_ms = connection.age().as_millis() as u64,
            "Pump finished"
        );
    }

    async fn read_loop<St, E>(&self, mut stream: St, connection: &Arc<Connection>)
    where
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let id = connection.id();
        let mut deadline = Instant::now() + self.pong_wait;

        loop {
            let frame = tokio::select! {
                () = connection.closed() => break,
                frame = timeout_at(deadline, stream.next()) => frame,
            };

            let message = match frame {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => {
                    let err = GatewayError::transport(e);
                    tracing::debug!(connection_id = %id, error = %err, "Read error");
                    break;
                }
                Ok(None) => {
                    tracing::debug!(connection_id = %id, "Stream ended");
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        connection_id = %id,
                        pong_wait_ms = self.pong_wait.as_millis() as u64,
                        "Keepalive timeout"
                    );
                    break;
                }
            };

            match message {
                Message::Text(text) => self.handle_frame(text.as_bytes(), connection),
                Message::Binary(bytes) => self.handle_frame(&bytes, connection),
                Message::Pong(_) => {
                    tracing::trace!(connection_id = %id, "Pong received");
                    deadline = Instant::now() + self.pong_wait;
                }
                Message::Ping(_) => {
                    // Answered by the WebSocket layer
                    tracing::trace!(connection_id = %id, "Ping received");
                }
                Message::Close(_) => {
                    tracing::debug!(connection_id = %id, "Client closed connection");
                    break;
                }
            }
        }

        self.registry.remove_client(id);
    }

    fn handle_frame(&self, bytes: &[u8], connection: &Arc<Connection>) {
        match Event::from_slice(bytes) {
            Ok(event) => {
                tracing::trace!(
                    connection_id = %connection.id(),
                    event_type = %event.event_type(),
                    "Received event"
                );
                self.registry.route_message(&event, connection);
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection.id(),
                    error = %GatewayError::from(e),
                    "Dropped inbound frame"
                );
            }
        }
    }

    async fn write_loop<Si>(
        &self,
        mut sink: Si,
        connection: &Arc<Connection>,
        mut outbound: mpsc::Receiver<Event>,
    ) where
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
    {
        let id = connection.id();
        let mut ticker = interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = connection.closed() => {
                    let _ = self.write_with_deadline(&mut sink, Message::Close(None)).await;
                    break;
                }

                event = outbound.recv() => {
                    let Some(event) = event else {
                        let _ = self.write_with_deadline(&mut sink, Message::Close(None)).await;
                        break;
                    };

                    let text = match event.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(connection_id = %id, error = %e, "Failed to encode event");
                            continue;
                        }
                    };

                    if let Err(e) = self.write_frame(&mut sink, connection, Message::Text(text)).await {
                        tracing::debug!(connection_id = %id, error = %e, "Write error");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.write_frame(&mut sink, connection, Message::Ping(Vec::new())).await {
                        tracing::debug!(connection_id = %id, error = %e, "Heartbeat failed");
                        break;
                    }
                }
            }
        }

        self.registry.remove_client(id);
    }

    /// Write one frame; gives up when the connection closes mid-write
    async fn write_frame<Si>(
        &self,
        sink: &mut Si,
        connection: &Connection,
        message: Message,
    ) -> Result<(), GatewayError>
    where
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
    {
        tokio::select! {
            () = connection.closed() => Err(GatewayError::transport("connection closed during write")),
            result = self.write_with_deadline(sink, message) => result,
        }
    }

    async fn write_with_deadline<Si>(&self, sink: &mut Si, message: Message) -> Result<(), GatewayError>
    where
        Si: Sink<Message> + Unpin,
        Si::Error: Display,
    {
        match timeout(self.write_wait, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(GatewayError::transport(e)),
            Err(_) => Err(GatewayError::transport(format!(
                "write deadline of {}ms exceeded",
                self.write_wait.as_millis()
            ))),
        }
    }
}

impl std::fmt::Debug for ConnectionPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPump")
            .field("pong_wait", &self.pong_wait)
            .field("ping_interval", &self.ping_interval)
            .field("write_wait", &self.write_wait)
            .finish()
    }
}
