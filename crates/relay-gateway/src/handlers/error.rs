//! Handler error types

use thiserror::Error;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload does not match the structure the handler expects
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// Building the outbound event failed
    #[error("Failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
