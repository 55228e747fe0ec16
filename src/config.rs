//! Startup configuration
//!
//! Host and port come from layered sources: built-in defaults, an
//! optional `config/default` file, and `APP_`-prefixed environment
//! variables (`APP_SERVER__PORT=9000` sets `server.port`). All
//! validation happens before the listener binds; a bad configuration
//! stops the process from starting at all.

use std::net::{SocketAddr, ToSocketAddrs};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

/// Errors that keep the server from starting
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("port {0} out of range 0-65534")]
    PortOutOfRange(u16),

    #[error("could not resolve an IPv4 address for host {0} (is the network up?)")]
    HostUnresolved(String),
}

/// Listener settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Top-level settings
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
}

impl Settings {
    /// Load and validate settings from defaults, file, and environment.
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the listener must never see.
    ///
    /// Ports above 65534 cannot be bound by this server; anything
    /// that does not fit in u16 already failed deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == u16::MAX {
            return Err(ConfigError::PortOutOfRange(self.server.port));
        }
        Ok(())
    }

    /// Resolve the configured host to its first IPv4 address.
    ///
    /// Resolution doubles as the connectivity check: a host that
    /// cannot be resolved, or resolves to no IPv4 address, is a fatal
    /// startup error reported before any bind is attempted.
    pub fn resolve_bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = self.server.host.as_str();
        let mut addrs = (host, self.server.port)
            .to_socket_addrs()
            .map_err(|_| ConfigError::HostUnresolved(self.server.host.clone()))?;

        addrs
            .find(|addr| addr.is_ipv4())
            .ok_or_else(|| ConfigError::HostUnresolved(self.server.host.clone()))
    }
}
