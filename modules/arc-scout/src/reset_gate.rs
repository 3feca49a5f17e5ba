use std::sync::Arc;

use arc_common::{RelayRequest, RelayResponse, SessionKey};
use tracing::{info, warn};

use crate::storage::SessionStore;
use crate::transport::RelayChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The marker already named this session; nothing was sent.
    AlreadyDone,
    /// The backend acknowledged the reset.
    Sent,
    /// The reset was attempted and failed. It will not be retried this session.
    Failed,
}

/// Sends the backend reset at most once per session key.
pub struct ResetGate {
    channel: Arc<dyn RelayChannel>,
    sessions: Arc<dyn SessionStore>,
}

impl ResetGate {
    pub fn new(channel: Arc<dyn RelayChannel>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { channel, sessions }
    }

    /// Reset the backend for `key` unless the session marker says it already happened.
    /// The marker is written whether or not the reset succeeded.
    pub async fn ensure_reset(&self, key: &SessionKey) -> ResetOutcome {
        match self.sessions.reset_marker().await {
            Ok(Some(marker)) if marker == *key => return ResetOutcome::AlreadyDone,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not read reset marker, resetting anyway"),
        }

        let outcome = match self.channel.request(RelayRequest::Reset).await {
            Ok(RelayResponse::Reset { ok: true }) => {
                info!(session = %key, "Backend reset");
                ResetOutcome::Sent
            }
            Ok(reply) => {
                warn!(session = %key, reply = ?reply, "Backend reset not acknowledged");
                ResetOutcome::Failed
            }
            Err(e) => {
                warn!(session = %key, error = %e, "Backend reset failed");
                ResetOutcome::Failed
            }
        };

        if let Err(e) = self.sessions.set_reset_marker(key).await {
            warn!(session = %key, error = %e, "Could not record reset marker");
        }
        outcome
    }
}
