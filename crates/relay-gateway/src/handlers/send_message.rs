//! `send_message` handler

use super::{EventHandler, HandlerError, HandlerResult};
use crate::connection::{Connection, Registry};
use crate::events::{Event, EventType, NewMessageEvent, SendMessageEvent};

/// Relays a chat message to every connection, sender included
#[derive(Debug, Default, Clone, Copy)]
pub struct SendMessageHandler;

impl EventHandler for SendMessageHandler {
    fn handle(&self, registry: &Registry, event: &Event, origin: &Connection) -> HandlerResult<()> {
        let message: SendMessageEvent = event
            .decode_payload()
            .map_err(HandlerError::InvalidPayload)?;

        let outbound = Event::from_payload(EventType::NewMessage, &NewMessageEvent::stamp(message))
            .map_err(HandlerError::Encode)?;

        let report = registry.broadcast(&outbound);

        tracing::debug!(
            connection_id = %origin.id(),
            delivered = report.delivered,
            dropped = report.dropped,
            disconnected = report.disconnected,
            "Message relayed"
        );

        Ok(())
    }
}
