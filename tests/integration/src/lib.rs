//! Integration test utilities for the relay
//!
//! Spawns a real server on an ephemeral port and drives it over HTTP and
//! WebSocket.

pub mod helpers;

pub use helpers::*;
