//! Configuration
//!
//! Relay settings come from the environment (a `.env` file is loaded by the
//! binary first). Session settings are built in code by whoever embeds a peer.

use std::net::SocketAddr;
use std::time::Duration;

/// Default relay port.
pub const DEFAULT_PORT: u16 = 3001;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `PORT` or `RELAY_ADDR` could not be parsed.
    #[error("invalid bind address: {0}")]
    InvalidAddress(String),

    /// A numeric variable could not be parsed.
    #[error("invalid number for {0}")]
    InvalidNumber(&'static str),
}

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// State updates queued per connection before new ones are dropped.
    pub outbound_buffer: usize,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            outbound_buffer: 64,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load from process environment.
    ///
    /// `PORT` wins over `RELAY_ADDR` (hosting platforms set `PORT`);
    /// anything unset falls back to [`RelayConfig::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match (lookup("PORT"), lookup("RELAY_ADDR")) {
            (Some(port), _) => {
                let addr = format!("0.0.0.0:{}", port.trim());
                addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))?
            }
            (None, Some(addr)) => addr
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(addr))?,
            (None, None) => defaults.bind_addr,
        };

        let max_connections = match lookup("MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("MAX_CONNECTIONS"))?,
            None => defaults.max_connections,
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            bind_addr,
            max_connections,
            log_level,
            ..defaults
        })
    }
}

/// Peer session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Relay WebSocket URL.
    pub relay_url: String,
    /// Wait before reconnecting after transport loss.
    pub reconnect_backoff: Duration,
    /// Host frame cadence.
    pub frame_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: format!("ws://localhost:{DEFAULT_PORT}"),
            reconnect_backoff: Duration::from_secs(3),
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl SessionConfig {
    /// Default session pointed at `relay_url`.
    pub fn with_relay(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            ..Self::default()
        }
    }
}
