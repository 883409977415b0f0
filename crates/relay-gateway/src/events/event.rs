//! Event envelope
//!
//! Every frame in either direction is a JSON object `{"type": ..., "payload": ...}`.
//! The payload is opaque here; only the handler registered for `type` decodes it.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// A single relay event
///
/// Immutable once built: fields are private and only exposed by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: String,

    #[serde(default)]
    payload: Value,
}

impl Event {
    /// Build an event from a tag and an already-encoded payload
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Build an event by encoding a typed payload
    pub fn from_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    /// The type tag
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The raw payload
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Decode the payload as a type-specific structure
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Decode an inbound frame
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize to a JSON string for an outbound frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event(type={})", self.event_type)
    }
}
