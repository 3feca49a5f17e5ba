//! Lifecycle controller.
//!
//! Owns the page session (dedup ledger + batch queue) and the enabled state, and
//! reacts to toggle commands and page signals:
//!
//! ```text
//! Disabled --enable()--> Enabling --reset gate done--> Enabled --disable()--> Disabled
//! ```
//!
//! Records are only accepted in `Enabled`, which is entered after the reset gate has
//! finished for the current session key, so the reset always precedes the first upload.

use std::sync::Arc;

use arc_common::{KeySpec, Record, SessionKey, Stage, StagedRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dedup::DedupLedger;
use crate::queue::{BatchQueue, QueueSettings};
use crate::reset_gate::{ResetGate, ResetOutcome};
use crate::storage::{SessionStore, SettingsStore, DEFAULT_ENABLED};
use crate::transport::{RelayChannel, RelayTransport, UploadTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Disabled,
    Enabling,
    Enabled,
}

/// Visibility and navigation events from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    Hidden,
    Visible,
    Navigated(SessionKey),
    Teardown,
}

/// Commands from the toggle UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "enabled", rename_all = "snake_case")]
pub enum ToggleCommand {
    SetEnabled(bool),
    GetStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleStatus {
    pub enabled: bool,
}

/// What happened to an observed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Queued,
    Duplicate,
    /// Scraping is not attached (disabled, still enabling, or torn down).
    Inactive,
}

/// Collaborators shared by every page session.
#[derive(Clone)]
pub struct ScoutDeps {
    pub channel: Arc<dyn RelayChannel>,
    pub transport: Arc<dyn UploadTransport>,
    pub settings: Arc<dyn SettingsStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl ScoutDeps {
    /// Uploads go through the same relay channel as everything else.
    pub fn over_relay(
        channel: Arc<dyn RelayChannel>,
        settings: Arc<dyn SettingsStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let transport = Arc::new(RelayTransport::new(channel.clone()));
        Self {
            channel,
            transport,
            settings,
            sessions,
        }
    }
}

/// Per-page state, replaced on navigation and dropped at teardown.
struct PageSession {
    key: SessionKey,
    ledger: DedupLedger,
    queue: BatchQueue,
}

pub struct Controller {
    state: LifecycleState,
    page: Option<PageSession>,
    deps: ScoutDeps,
    gate: ResetGate,
    key_spec: KeySpec,
    queue_settings: QueueSettings,
}

impl Controller {
    pub fn new(session_key: SessionKey, deps: ScoutDeps, config: &PipelineConfig) -> Self {
        let gate = ResetGate::new(deps.channel.clone(), deps.sessions.clone());
        let queue_settings = config.queue_settings();
        let page = PageSession {
            key: session_key,
            ledger: DedupLedger::new(),
            queue: BatchQueue::new(queue_settings, deps.transport.clone()),
        };
        Self {
            state: LifecycleState::Disabled,
            page: Some(page),
            deps,
            gate,
            key_spec: config.key_spec.clone(),
            queue_settings,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == LifecycleState::Enabled
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.page.as_ref().map(|p| &p.key)
    }

    /// Records buffered and not yet flushed.
    pub fn pending(&self) -> usize {
        self.page.as_ref().map(|p| p.queue.pending()).unwrap_or(0)
    }

    /// Read the persisted flag and enable if it is set.
    pub async fn boot(&mut self) -> LifecycleState {
        let enabled = match self.deps.settings.enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!(error = %e, "Could not read enabled flag, using default");
                DEFAULT_ENABLED
            }
        };
        if enabled {
            self.enable().await;
        }
        self.state
    }

    /// Run the reset gate for the current session, then attach scraping.
    /// A failed reset is logged and scraping is attached anyway.
    pub async fn enable(&mut self) {
        if self.state != LifecycleState::Disabled {
            return;
        }
        let Some(key) = self.session_key().cloned() else {
            warn!("Enable requested after teardown, ignoring");
            return;
        };

        self.state = LifecycleState::Enabling;
        match self.gate.ensure_reset(&key).await {
            ResetOutcome::Failed => warn!(session = %key, "Enabling despite failed reset"),
            outcome => debug!(session = %key, ?outcome, "Reset gate passed"),
        }
        self.state = LifecycleState::Enabled;
        info!(session = %key, "Scraping enabled");
    }

    /// Detach scraping and send whatever is buffered before returning.
    /// The dedup ledger is kept so re-enabling does not re-send seen records.
    pub async fn disable(&mut self) {
        let was_enabled = self.state != LifecycleState::Disabled;
        self.state = LifecycleState::Disabled;
        // Flushes even when already disabled; the buffer may still hold records.
        let flushed = match &self.page {
            Some(page) => page.queue.flush_now().await,
            None => 0,
        };
        if was_enabled {
            info!(flushed, "Scraping disabled");
        }
    }

    /// The scraping path: key the record, dedup it, and enqueue it.
    pub fn observe(&mut self, record: Record, stage: Stage) -> Observation {
        if self.state != LifecycleState::Enabled {
            return Observation::Inactive;
        }
        let Some(page) = self.page.as_mut() else {
            return Observation::Inactive;
        };

        let key = self.key_spec.derive(&record);
        if !page.ledger.should_enqueue(&key, &stage) {
            debug!(key = %key, stage = %stage, "Duplicate record skipped");
            return Observation::Duplicate;
        }
        page.queue.enqueue(StagedRecord::new(key, stage, record));
        Observation::Queued
    }

    pub async fn handle_toggle(&mut self, command: ToggleCommand) -> ToggleStatus {
        if let ToggleCommand::SetEnabled(enabled) = command {
            if let Err(e) = self.deps.settings.set_enabled(enabled).await {
                warn!(error = %e, enabled, "Could not persist enabled flag");
            }
            if enabled {
                self.enable().await;
            } else {
                self.disable().await;
            }
        }
        ToggleStatus {
            enabled: self.is_enabled(),
        }
    }

    pub async fn on_page_signal(&mut self, signal: PageSignal) {
        match signal {
            PageSignal::Hidden => {
                if let Some(page) = &self.page {
                    page.queue.flush();
                }
            }
            PageSignal::Visible => {}
            PageSignal::Navigated(key) => self.navigate(key).await,
            PageSignal::Teardown => self.teardown().await,
        }
    }

    /// Wait for in-flight sends of the current page to finish.
    pub async fn settle(&self) {
        if let Some(page) = &self.page {
            page.queue.settle().await;
        }
    }

    async fn navigate(&mut self, key: SessionKey) {
        if self.session_key() == Some(&key) {
            return;
        }
        // Every old-session batch, including ones already triggered, is sent
        // before the new session's reset.
        if let Some(old) = self.page.take() {
            old.queue.flush_now().await;
        }
        info!(session = %key, "New page session");
        self.page = Some(PageSession {
            key: key.clone(),
            ledger: DedupLedger::new(),
            queue: BatchQueue::new(self.queue_settings, self.deps.transport.clone()),
        });

        if self.state == LifecycleState::Enabled {
            self.state = LifecycleState::Enabling;
            if self.gate.ensure_reset(&key).await == ResetOutcome::Failed {
                warn!(session = %key, "Continuing despite failed reset");
            }
            self.state = LifecycleState::Enabled;
        }
    }

    async fn teardown(&mut self) {
        self.state = LifecycleState::Disabled;
        if let Some(page) = self.page.take() {
            let flushed = page.queue.flush_now().await;
            info!(session = %page.key, flushed, "Page torn down");
        }
    }
}
