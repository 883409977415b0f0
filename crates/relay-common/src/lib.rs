//! # relay-common
//!
//! Shared utilities for the relay: configuration, error handling, credential
//! verification and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{hash_password, verify_password, CredentialVerifier, StaticCredentials};
pub use config::{
    AppConfig, AppSettings, AuthConfig, ConfigError, Environment, RelayConfig, ServerConfig,
    SlowConsumerPolicy, TokenConfig,
};
pub use error::AppError;
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
