use std::env;
use std::str::FromStr;

use tracing::info;

use crate::error::{ArcError, Result};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8001";
pub const DEFAULT_RELAY_HOST: &str = "127.0.0.1";
pub const DEFAULT_RELAY_PORT: u16 = 8002;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Relay configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ArcConfig {
    /// Backend base URL (`/ingest`, `/score`, `/reset` hang off it).
    pub api_base: String,

    // Relay listener
    pub relay_host: String,
    pub relay_port: u16,

    pub http_timeout_secs: u64,
}

impl ArcConfig {
    /// Load configuration from environment variables, falling back to local defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_base: env_or("ARC_API_BASE", DEFAULT_API_BASE),
            relay_host: env_or("ARC_RELAY_HOST", DEFAULT_RELAY_HOST),
            relay_port: parse_env("ARC_RELAY_PORT", DEFAULT_RELAY_PORT)?,
            http_timeout_secs: parse_env("ARC_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        })
    }

    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.relay_host, self.relay_port)
    }

    pub fn log_summary(&self) {
        info!(
            api_base = self.api_base.as_str(),
            relay_addr = %self.relay_addr(),
            http_timeout_secs = self.http_timeout_secs,
            "Relay configuration loaded"
        );
    }
}

impl Default for ArcConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            relay_host: DEFAULT_RELAY_HOST.to_string(),
            relay_port: DEFAULT_RELAY_PORT,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Read `key`, or `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse `key`, or `default` when unset. A set-but-unparseable value is an error.
pub fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ArcError::Config(format!("{key} must be a valid value ({raw:?}): {e}"))),
        Err(_) => Ok(default),
    }
}
