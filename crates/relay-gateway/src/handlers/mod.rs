//! Event handlers
//!
//! Maps an event's type tag to the handler that understands its payload.

mod error;
mod send_message;

pub use error::{HandlerError, HandlerResult};
pub use send_message::SendMessageHandler;

use crate::connection::{Connection, Registry};
use crate::events::{Event, EventType};
use std::collections::HashMap;

/// Handles one event type
pub trait EventHandler: Send + Sync {
    /// Handle `event`, received on `origin`
    fn handle(&self, registry: &Registry, event: &Event, origin: &Connection) -> HandlerResult<()>;
}

/// What the router did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Handled,
    /// No handler is registered for the event's type
    Ignored,
}

/// Routes inbound events to handlers by type tag
///
/// Populated once at startup; lookups afterwards are read-only.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Box<dyn EventHandler>>,
}

impl EventRouter {
    /// Create a router with no handlers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with the built-in handlers
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let mut router = Self::new();
        router.register(EventType::SendMessage, SendMessageHandler);
        router
    }

    /// Register `handler` for `event_type`, replacing any previous one
    pub fn register(&mut self, event_type: impl Into<String>, handler: impl EventHandler + 'static) {
        self.handlers.insert(event_type.into(), Box::new(handler));
    }

    /// Dispatch `event` to its handler
    pub fn route(
        &self,
        registry: &Registry,
        event: &Event,
        origin: &Connection,
    ) -> HandlerResult<RouteOutcome> {
        match self.handlers.get(event.event_type()) {
            Some(handler) => {
                handler.handle(registry, event, origin)?;
                Ok(RouteOutcome::Handled)
            }
            None => Ok(RouteOutcome::Ignored),
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("EventRouter").field("handlers", &types).finish()
    }
}
