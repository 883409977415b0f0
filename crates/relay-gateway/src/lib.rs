//! # relay-gateway
//!
//! WebSocket chat relay: one-time login tokens, per-connection pumps and
//! broadcast fan-out to every live connection.

pub mod connection;
pub mod error;
pub mod events;
pub mod handlers;
pub mod server;
pub mod tokens;

pub use connection::{BroadcastReport, Connection, ConnectionId, ConnectionPump, Registry};
pub use error::GatewayError;
pub use events::{Event, EventType};
pub use handlers::{EventHandler, EventRouter};
pub use server::{create_app, create_gateway_state, run, serve, GatewayState};
pub use tokens::TokenStore;
