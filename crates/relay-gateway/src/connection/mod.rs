//! Connection management
//!
//! Live WebSocket connections, the registry that owns them, and the pump that
//! drives each one.

mod connection;
mod pump;
mod registry;

pub use connection::{Connection, ConnectionId};
pub use pump::ConnectionPump;
pub use registry::{BroadcastReport, Registry};
