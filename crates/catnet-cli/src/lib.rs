//! Shared pieces of the `catnet-server` and `catnet-client` binaries.

pub mod packets;

use std::path::PathBuf;

use anyhow::{Context, Result};
use catnet::NetConfig;
use clap::Args;

/// Network options accepted by both binaries.
///
/// Values given on the command line override the config file, which in
/// turn overrides the built-in defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct NetArgs {
    /// JSON config file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Host to bind (server) or connect to (client).
    #[arg(long)]
    pub host: Option<String>,
    /// UDP port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Size of the user id pool.
    #[arg(long)]
    pub max_users: Option<usize>,
    /// Log filter, e.g. `debug` or `catnet=trace`. `RUST_LOG` wins.
    #[arg(long)]
    pub log: Option<String>,
}

impl NetArgs {
    /// Builds the effective config and validates it.
    pub fn load(&self) -> Result<NetConfig> {
        let mut config = match &self.config {
            Some(path) => NetConfig::from_file(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => NetConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max_users) = self.max_users {
            config.max_users = max_users;
        }
        if let Some(log) = &self.log {
            config.log_filter = log.clone();
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// One line of client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/ping`
    Ping,
    /// `/quit`, or end of input.
    Quit,
    /// Any other non-empty line.
    Say(String),
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line.trim() {
            "" => None,
            "/ping" => Some(Self::Ping),
            "/quit" => Some(Self::Quit),
            _ => Some(Self::Say(line.to_string())),
        }
    }
}
