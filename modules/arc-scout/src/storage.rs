// Persisted state.
//
// SettingsStore holds the "enabled" flag that survives across sessions.
// SessionStore holds the marker recording which session key already completed reset;
// it lives only as long as the session it belongs to.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use arc_common::SessionKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Overlay state when nothing has been persisted yet.
pub const DEFAULT_ENABLED: bool = true;

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn enabled(&self) -> Result<bool>;
    async fn set_enabled(&self, enabled: bool) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn reset_marker(&self) -> Result<Option<SessionKey>>;
    async fn set_reset_marker(&self, key: &SessionKey) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reset_marker: Option<SessionKey>,
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-lifetime store. Dropping it ends the session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoredState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StoredState) -> T) -> T {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn enabled(&self) -> Result<bool> {
        Ok(self.with_state(|s| s.enabled.unwrap_or(DEFAULT_ENABLED)))
    }

    async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.with_state(|s| s.enabled = Some(enabled));
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn reset_marker(&self) -> Result<Option<SessionKey>> {
        Ok(self.with_state(|s| s.reset_marker.clone()))
    }

    async fn set_reset_marker(&self, key: &SessionKey) -> Result<()> {
        self.with_state(|s| s.reset_marker = Some(key.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// A small JSON document on disk. A missing file reads as the defaults.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoredState> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(StoredState::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, f: impl FnOnce(&mut StoredState) + Send) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;
        f(&mut state);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&state)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn enabled(&self) -> Result<bool> {
        Ok(self.load().await?.enabled.unwrap_or(DEFAULT_ENABLED))
    }

    async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.update(move |s| s.enabled = Some(enabled)).await
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn reset_marker(&self) -> Result<Option<SessionKey>> {
        Ok(self.load().await?.reset_marker)
    }

    async fn set_reset_marker(&self, key: &SessionKey) -> Result<()> {
        let key = key.clone();
        self.update(move |s| s.reset_marker = Some(key)).await
    }
}
