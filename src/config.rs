//! Configuration management for LinkChain
//!
//! Values come from an optional TOML file, then environment variables
//! (`NODE_ADDRESS`, `API_ADDRESS`, `INITIAL_PEER`) override them. The node
//! core never reads the environment itself; it is handed plain values.

use crate::error::{ChainError, Result};
use crate::protocol::codec::Framing;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listening address for peer connections.
    pub node_address: String,
    /// Listening address for the HTTP surface.
    pub api_address: String,
    pub initial_peer: Option<String>,
    pub framing: Framing,
    pub dial_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_address: default_node_address(),
            api_address: default_api_address(),
            initial_peer: None,
            framing: Framing::default(),
            dial_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_node_address() -> String {
    "localhost:3001".to_string()
}

fn default_api_address() -> String {
    "localhost:8080".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Config {
    /// Applies environment-style overrides. Empty addresses are ignored; an
    /// empty `INITIAL_PEER` clears the bootstrap peer.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("NODE_ADDRESS").filter(|v| !v.is_empty()) {
            self.node_address = addr;
        }
        if let Some(addr) = lookup("API_ADDRESS").filter(|v| !v.is_empty()) {
            self.api_address = addr;
        }
        if let Some(peer) = lookup("INITIAL_PEER") {
            self.initial_peer = Some(peer).filter(|p| !p.is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_address.is_empty() {
            return Err(ChainError::Config("node_address must be set".to_string()));
        }
        if self.api_address.is_empty() {
            return Err(ChainError::Config("api_address must be set".to_string()));
        }
        if self.dial_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(ChainError::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config> {
    load_config_from(Path::new(DEFAULT_CONFIG_PATH))
}

/// Reads `path` if it exists (a missing file yields defaults), then applies
/// the process environment on top.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ChainError::Config(format!("cannot read {}: {}", path.display(), e)))
        }
    };

    let mut config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)
            .map_err(|e| ChainError::Config(format!("invalid {}: {}", path.display(), e)))?
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
