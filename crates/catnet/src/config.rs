//! Configuration for catnet servers and clients.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "port": 9000, "max_users": 8 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use catnet_session::{SessionConfig, MAX_CAPACITY};
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a [`NetConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for this structure.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Network settings shared by [`Server`](crate::Server) and
/// [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Address to bind (server) or connect to (client).
    /// Default: `127.0.0.1`.
    pub host: String,

    /// UDP port. Default: 8080. A server may use 0 to let the OS pick.
    pub port: u16,

    /// Channels per connection. Default: 1.
    pub channels: u8,

    /// Transport-level connection limit. Default: 32.
    pub max_peers: usize,

    /// Size of the user id pool. Default: 32.
    pub max_users: usize,

    /// How long one poll waits for the first event, in milliseconds.
    /// Default: 10.
    pub poll_timeout_ms: u64,

    /// Channel used for outgoing packets. Default: 0.
    pub send_channel: u8,

    /// Default `tracing` filter, overridden by `RUST_LOG`.
    /// Default: `info`.
    pub log_filter: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            channels: 1,
            max_peers: 32,
            max_users: 32,
            poll_timeout_ms: 10,
            send_channel: 0,
            log_filter: "info".to_string(),
        }
    }
}

impl NetConfig {
    /// Parses a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&content)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.channels == 0 {
            return Err(ConfigError::Invalid(
                "channels must be at least 1".into(),
            ));
        }
        if self.send_channel >= self.channels {
            return Err(ConfigError::Invalid(format!(
                "send_channel {} is out of range for {} channel(s)",
                self.send_channel, self.channels
            )));
        }
        if self.max_peers == 0 {
            return Err(ConfigError::Invalid(
                "max_peers must be at least 1".into(),
            ));
        }
        if self.max_users > MAX_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "max_users {} exceeds the limit of {MAX_CAPACITY}",
                self.max_users
            )));
        }
        Ok(())
    }

    /// The poll timeout as a [`Duration`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The user table settings derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_users: self.max_users,
        }
    }
}
