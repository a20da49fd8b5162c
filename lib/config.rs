// Relay configuration: built-in defaults overlaid with environment variables
use relay_core::{Endpoint, RelayError, DEFAULT_CHUNK_SIZE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SENTINEL};
use std::env;

// Environment variables for configuration
// RELAY_HOST: Interface to bind or dial (default: 127.0.0.1)
// RELAY_PORT: TCP port (default: 25565)
// RELAY_CHUNK_SIZE: Bytes per receive call (default: 1024)
// RELAY_SENTINEL: Input line that ends the session (default: break)
// RELAY_PEER_LABEL: Prefix for received text on the console (default: client)

pub const DEFAULT_PEER_LABEL: &str = "client";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub endpoint: Endpoint,
    pub chunk_size: usize,
    pub sentinel: String,
    pub peer_label: String,
    pub timestamps: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            endpoint: Endpoint::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            sentinel: DEFAULT_SENTINEL.to_string(),
            peer_label: DEFAULT_PEER_LABEL.to_string(),
            timestamps: false,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("RELAY_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = lookup("RELAY_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let chunk_size = lookup("RELAY_CHUNK_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let sentinel = lookup("RELAY_SENTINEL").unwrap_or_else(|| DEFAULT_SENTINEL.to_string());

        let peer_label =
            lookup("RELAY_PEER_LABEL").unwrap_or_else(|| DEFAULT_PEER_LABEL.to_string());

        RelayConfig {
            endpoint: Endpoint::new(&host, port),
            chunk_size,
            sentinel,
            peer_label,
            timestamps: false,
        }
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.chunk_size == 0 {
            return Err(RelayError::Config("chunk size must be at least 1 byte".into()));
        }
        if self.sentinel.is_empty() {
            return Err(RelayError::Config("sentinel must not be empty".into()));
        }
        if self.endpoint.host.is_empty() {
            return Err(RelayError::Config("host must not be empty".into()));
        }
        Ok(())
    }
}
