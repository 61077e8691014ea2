//! Daemon configuration.
//!
//! Values come from an optional TOML file, then environment overrides:
//!
//! | Variable            | Effect                                         |
//! |---------------------|------------------------------------------------|
//! | `COEUS_LISTEN_ADDR` | replaces `listen_addr`                         |
//! | `PORT`              | replaces only the port of `listen_addr`        |
//! | `RUN_ON_HEROKU`     | when `true`, `PORT` must be set                |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{
    ConnectionSettings, DEFAULT_OUTBOUND_CAPACITY, PING_INTERVAL, READ_TIMEOUT, WRITE_TIMEOUT,
};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid listen address '{value}'")]
    InvalidListenAddr { value: String },

    #[error("Invalid PORT '{value}'")]
    InvalidPort { value: String },

    #[error("RUN_ON_HEROKU is set but PORT is not")]
    MissingPort,

    #[error("Invalid value for {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Effective configuration of the live-update daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub listen_addr: String,
    /// Outbound queue slots per connection
    pub outbound_capacity: usize,
    /// Close a connection that sends nothing for this long
    pub read_timeout_secs: u64,
    /// Close a connection whose single write takes longer than this
    pub write_timeout_secs: u64,
    /// Keepalive ping period
    pub ping_interval_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            read_timeout_secs: READ_TIMEOUT.as_secs(),
            write_timeout_secs: WRITE_TIMEOUT.as_secs(),
            ping_interval_secs: PING_INTERVAL.as_secs(),
        }
    }
}

impl LiveConfig {
    /// Loads the file (if any), applies process environment overrides and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("COEUS_LISTEN_ADDR") {
            self.listen_addr = addr;
        }

        let port = lookup("PORT");
        let on_heroku = lookup("RUN_ON_HEROKU").is_some_and(|v| v.trim() == "true");
        if on_heroku && port.is_none() {
            return Err(ConfigError::MissingPort);
        }

        if let Some(port) = port {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value: port.clone() })?;
            let mut addr = self.socket_addr()?;
            addr.set_port(port);
            self.listen_addr = addr.to_string();
        }

        Ok(())
    }

    /// Rejects values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.outbound_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "outbound_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.read_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "read_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "write_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.ping_interval_secs == 0 || self.ping_interval_secs >= self.read_timeout_secs {
            return Err(ConfigError::OutOfRange {
                field: "ping_interval_secs",
                reason: format!(
                    "must be between 1 and read_timeout_secs ({}) exclusive",
                    self.read_timeout_secs
                ),
            });
        }

        Ok(())
    }

    /// The listen address, parsed.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr {
                value: self.listen_addr.clone(),
            })
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            outbound_capacity: self.outbound_capacity.max(1),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
        }
    }
}
