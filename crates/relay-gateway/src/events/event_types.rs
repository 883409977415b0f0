//! Relay event type tags

use std::fmt;

/// Event types the relay knows about
///
/// Inbound frames may carry any tag; only these have meaning to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Client asks the server to relay a chat message
    SendMessage,
    /// Server fans a relayed chat message out to every connection
    NewMessage,
}

impl EventType {
    /// Get the wire tag of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::NewMessage => "new_message",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventType> for String {
    fn from(event: EventType) -> Self {
        event.as_str().to_string()
    }
}
