use std::path::PathBuf;
use std::time::Duration;

use arc_common::config::{env_or, parse_env, DEFAULT_HTTP_TIMEOUT_SECS};
use arc_common::{ArcError, KeySpec};
use tracing::info;

use crate::queue::QueueSettings;

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8002";
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;
pub const DEFAULT_STATE_DIR: &str = ".arc";

const SETTINGS_FILE: &str = "settings.json";

/// Scraping-side pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub relay_url: String,
    pub batch_size: usize,
    pub debounce: Duration,
    /// Holds the persisted settings (enabled flag).
    pub state_dir: PathBuf,
    pub key_spec: KeySpec,
    pub http_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ArcError> {
        let key_spec = match std::env::var("ARC_KEY_FIELDS") {
            Ok(list) => KeySpec::parse(&list)?,
            Err(_) => KeySpec::default(),
        };

        let config = Self {
            relay_url: env_or("ARC_RELAY_URL", DEFAULT_RELAY_URL),
            batch_size: parse_env("ARC_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            debounce: Duration::from_millis(parse_env("ARC_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?),
            state_dir: PathBuf::from(env_or("ARC_STATE_DIR", DEFAULT_STATE_DIR)),
            key_spec,
            http_timeout_secs: parse_env("ARC_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ArcError> {
        if self.batch_size == 0 {
            return Err(ArcError::Config("ARC_BATCH_SIZE must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            batch_size: self.batch_size,
            debounce: self.debounce,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.state_dir.join(SETTINGS_FILE)
    }

    pub fn log_summary(&self) {
        info!(
            relay_url = self.relay_url.as_str(),
            batch_size = self.batch_size,
            debounce_ms = self.debounce.as_millis() as u64,
            state_dir = %self.state_dir.display(),
            key_fields = ?self.key_spec.fields(),
            "Pipeline configuration loaded"
        );
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            key_spec: KeySpec::default(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}
