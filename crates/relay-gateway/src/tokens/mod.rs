//! One-time login tokens
//!
//! Short-lived, single-use credentials handed out by `/login` and redeemed by
//! the WebSocket upgrade.

mod store;

pub use store::{Token, TokenStore};
