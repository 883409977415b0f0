//! Gateway error taxonomy
//!
//! Every failure is contained to the smallest scope it affects: one login
//! attempt, one frame, or one connection.

use crate::handlers::HandlerError;
use relay_common::AppError;
use thiserror::Error;

/// Errors raised while accepting or serving a connection
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Token missing, unknown, already used or expired
    #[error("Invalid or expired one-time token")]
    Auth,

    /// Origin rejected or WebSocket handshake failed
    #[error("Upgrade failed: {0}")]
    Upgrade(String),

    /// Malformed event envelope
    #[error("Malformed event: {0}")]
    Decode(#[from] serde_json::Error),

    /// Read/write failure or keepalive deadline expiry
    #[error("Transport error: {0}")]
    Transport(String),

    /// A dispatched handler failed
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl GatewayError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Auth => AppError::InvalidToken,
            GatewayError::Upgrade(reason) => AppError::UpgradeRejected(reason),
            other => AppError::internal(other),
        }
    }
}
