//! Gateway state
//!
//! Application state shared by every request handler.

use crate::connection::{Connection, ConnectionPump, Registry};
use crate::events::Event;
use crate::tokens::TokenStore;
use relay_common::{AppConfig, CredentialVerifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Gateway application state
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct GatewayState {
    /// Live connections and broadcast fan-out
    registry: Arc<Registry>,
    /// Outstanding one-time tokens
    tokens: Arc<TokenStore>,
    /// Login predicate
    credentials: Arc<dyn CredentialVerifier>,
    pump: ConnectionPump,
    config: Arc<AppConfig>,
    /// Fired once when the server begins shutting down
    shutdown: CancellationToken,
}

impl GatewayState {
    /// Build the state for `config`
    ///
    /// Background tasks are not started here; see `create_gateway_state`.
    pub fn new(config: AppConfig, credentials: Arc<dyn CredentialVerifier>) -> Self {
        let registry = Registry::new_shared(config.relay.slow_consumer);
        let tokens = TokenStore::new_shared(config.tokens.retention());
        let pump = ConnectionPump::new(&config.relay, registry.clone());

        Self {
            registry,
            tokens,
            credentials,
            pump,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialVerifier> {
        &self.credentials
    }

    pub fn pump(&self) -> &ConnectionPump {
        &self.pump
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Register a freshly upgraded connection
    ///
    /// Returns `None` once shutdown has begun. Shutdown is checked again after
    /// the insert, so a connection can never land in the registry after
    /// `close_all` has drained it.
    pub fn register_connection(
        &self,
        remote_addr: Option<SocketAddr>,
    ) -> Option<(Arc<Connection>, mpsc::Receiver<Event>)> {
        if self.shutdown.is_cancelled() {
            return None;
        }

        let (connection, outbound) = self
            .registry
            .connect(remote_addr, self.config.relay.outbound_buffer);

        if self.shutdown.is_cancelled() {
            self.registry.remove_client(connection.id());
            return None;
        }

        Some((connection, outbound))
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("tokens", &self.tokens)
            .field("config", &"AppConfig")
            .finish()
    }
}
