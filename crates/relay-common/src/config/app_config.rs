//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub tokens: TokenConfig,
    pub auth: AuthConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the registry does when a peer's outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlowConsumerPolicy {
    /// Drop the event for that peer only
    #[default]
    Drop,
    /// Disconnect the peer
    Disconnect,
}

impl FromStr for SlowConsumerPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(ConfigError::InvalidValue("RELAY_SLOW_CONSUMER", other.to_string())),
        }
    }
}

/// Connection keepalive, framing and fan-out settings
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// How long a connection may go without a pong before it is dropped
    #[serde(default = "default_pong_wait_ms")]
    pub pong_wait_ms: u64,
    /// How long a single frame write may take before the connection is dropped
    #[serde(default = "default_write_wait_ms")]
    pub write_wait_ms: u64,
    /// Maximum inbound frame size in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Capacity of each connection's outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    #[serde(default)]
    pub slow_consumer: SlowConsumerPolicy,
    /// Accepted `Origin` values for upgrade requests
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl RelayConfig {
    /// Keepalive timeout window
    #[must_use]
    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    /// Deadline for one socket write
    #[must_use]
    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    /// Heartbeat send interval, 9/10 of the pong wait
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pong_wait_ms: default_pong_wait_ms(),
            write_wait_ms: default_write_wait_ms(),
            max_frame_size: default_max_frame_size(),
            outbound_buffer: default_outbound_buffer(),
            slow_consumer: SlowConsumerPolicy::default(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// One-time token settings
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_retention_ms")]
    pub retention_ms: u64,
}

impl TokenConfig {
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            retention_ms: default_token_retention_ms(),
        }
    }
}

/// Login credentials accepted by the relay
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_username")]
    pub username: String,
    /// Plaintext password, hashed at startup when no hash is given
    #[serde(default = "default_password")]
    pub password: String,
    /// Argon2 PHC string; takes precedence over `password`
    #[serde(default)]
    pub password_hash: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
            password_hash: None,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// Default value functions
fn default_app_name() -> String {
    "relay".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_pong_wait_ms() -> u64 {
    10_000
}

fn default_write_wait_ms() -> u64 {
    10_000
}

fn default_max_frame_size() -> usize {
    512
}

fn default_outbound_buffer() -> usize {
    100
}

fn default_allowed_origins() -> Vec<String> {
    vec!["localhost:8080".to_string()]
}

fn default_token_retention_ms() -> u64 {
    5_000
}

fn default_username() -> String {
    "test".to_string()
}

fn default_password() -> String {
    "123".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::default(),
            },
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            relay: RelayConfig::default(),
            tokens: TokenConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed, or if a
    /// value is out of range
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: parse_or(&lookup, "APP_ENV", Environment::default)?,
            },
            server: ServerConfig {
                host: lookup("RELAY_HOST").unwrap_or_else(default_host),
                port: parse_or(&lookup, "RELAY_PORT", default_port)?,
            },
            relay: RelayConfig {
                pong_wait_ms: parse_or(&lookup, "RELAY_PONG_WAIT_MS", default_pong_wait_ms)?,
                write_wait_ms: parse_or(&lookup, "RELAY_WRITE_WAIT_MS", default_write_wait_ms)?,
                max_frame_size: parse_or(&lookup, "RELAY_MAX_FRAME_SIZE", default_max_frame_size)?,
                outbound_buffer: parse_or(&lookup, "RELAY_OUTBOUND_BUFFER", default_outbound_buffer)?,
                slow_consumer: parse_or(&lookup, "RELAY_SLOW_CONSUMER", SlowConsumerPolicy::default)?,
                allowed_origins: lookup("RELAY_ALLOWED_ORIGINS")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|o| !o.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_else(default_allowed_origins),
            },
            tokens: TokenConfig {
                retention_ms: parse_or(&lookup, "RELAY_TOKEN_RETENTION_MS", default_token_retention_ms)?,
            },
            auth: AuthConfig {
                username: lookup("AUTH_USERNAME").unwrap_or_else(default_username),
                password: lookup("AUTH_PASSWORD").unwrap_or_else(default_password),
                password_hash: lookup("AUTH_PASSWORD_HASH").filter(|h| !h.is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.pong_wait_ms == 0 {
            return Err(ConfigError::InvalidValue("RELAY_PONG_WAIT_MS", "must be > 0".to_string()));
        }
        if self.relay.write_wait_ms == 0 {
            return Err(ConfigError::InvalidValue("RELAY_WRITE_WAIT_MS", "must be > 0".to_string()));
        }
        if self.relay.max_frame_size == 0 {
            return Err(ConfigError::InvalidValue("RELAY_MAX_FRAME_SIZE", "must be > 0".to_string()));
        }
        if self.relay.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue("RELAY_OUTBOUND_BUFFER", "must be > 0".to_string()));
        }
        if self.tokens.retention_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_TOKEN_RETENTION_MS",
                "must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
