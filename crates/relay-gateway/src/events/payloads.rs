//! Event payloads
//!
//! Payload structures for the event types in [`super::EventType`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of an inbound `send_message` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageEvent {
    pub message: String,
    pub from: String,
}

/// Payload of an outbound `new_message` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub message: String,
    pub from: String,
    /// Server-side time the message was relayed
    pub sent: DateTime<Utc>,
}

impl NewMessageEvent {
    /// Stamp an inbound message with the current server time
    #[must_use]
    pub fn stamp(message: SendMessageEvent) -> Self {
        Self::stamp_at(message, Utc::now())
    }

    #[must_use]
    pub fn stamp_at(message: SendMessageEvent, sent: DateTime<Utc>) -> Self {
        Self {
            message: message.message,
            from: message.from,
            sent,
        }
    }
}
