//! Relay events
//!
//! The generic `{type, payload}` envelope carried by every frame, plus the
//! payloads of the event types the relay understands.

mod event;
mod event_types;
mod payloads;

pub use event::Event;
pub use event_types::EventType;
pub use payloads::{NewMessageEvent, SendMessageEvent};
