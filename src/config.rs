//! Host-facing configuration for a caller or responder endpoint, loadable
//! from a TOML file via `serde`: one struct holding every tunable with
//! per-field defaults and a `load` that reads a path straight into it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::link::{DEFAULT_ACK_TIMEOUT, DEFAULT_BAUD_RATE};
use crate::{Error, Result};

const DEFAULT_CHUNK_SIZE: usize = crate::frame::DEFAULT_CHUNK_SIZE;

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_ack_timeout_ms() -> u64 {
    DEFAULT_ACK_TIMEOUT.as_millis() as u64
}

/// Configuration recognized by a caller or responder endpoint.
/// `ack_timeout_ms` is stored in milliseconds since `serde` has no native
/// `Duration` representation; [`LinkConfig::ack_timeout`] converts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub port_name: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            port_name: String::new(),
            baud_rate: default_baud_rate(),
            chunk_size: default_chunk_size(),
            ack_timeout_ms: default_ack_timeout_ms(),
        }
    }
}

impl LinkConfig {
    /// Loads configuration from a TOML file on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<LinkConfig> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::InvalidConfig(format!("could not read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses configuration from an already-read TOML string.
    pub fn from_toml_str(text: &str) -> Result<LinkConfig> {
        toml::from_str(text).map_err(|e| Error::InvalidConfig(format!("invalid config: {e}")))
    }

    /// The configured ACK timeout as a [`Duration`].
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Validates the configuration without attempting to open a port.
    pub fn validate(&self) -> Result<()> {
        if self.port_name.is_empty() {
            return Err(Error::InvalidConfig("port_name must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}
