//! Privileged message relay.
//!
//! The scraping side cannot make cross-origin calls to the backend, so it posts
//! type-tagged messages here and the relay performs the HTTP request on its behalf.
//! Every failure is answered with a `failed` message; nothing escapes as a fault.

use std::sync::Arc;
use std::time::Duration;

use arc_backend_client::BackendClient;
use arc_common::{ArcConfig, RelayRequest, RelayResponse};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tracing::{info, warn};

pub struct Relay {
    backend: BackendClient,
}

impl Relay {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &ArcConfig) -> anyhow::Result<Self> {
        let backend = BackendClient::new(
            &config.api_base,
            Duration::from_secs(config.http_timeout_secs),
        )?;
        Ok(Self::new(backend))
    }

    /// Dispatch one parsed request to the backend.
    pub async fn handle(&self, request: RelayRequest) -> RelayResponse {
        match request {
            RelayRequest::Ping => {
                info!("Ping");
                RelayResponse::Pong {
                    time: chrono::Utc::now(),
                }
            }
            RelayRequest::UploadBatch { payload } => {
                info!(count = payload.len(), "Uploading batch");
                match self.backend.ingest(&payload).await {
                    Ok(reply) => {
                        if !reply.ok {
                            warn!(status = reply.status, body = ?reply.body, "Backend rejected batch");
                        }
                        RelayResponse::Uploaded {
                            ok: reply.ok,
                            status: reply.status,
                            body: reply.body,
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, count = payload.len(), "Upload failed");
                        RelayResponse::failed(e.to_string())
                    }
                }
            }
            RelayRequest::GetScores { payload } => match self.backend.score(&payload).await {
                Ok(scores) => RelayResponse::Scores { ok: true, scores },
                Err(e) => {
                    warn!(error = %e, count = payload.len(), "Scoring failed");
                    RelayResponse::failed(e.to_string())
                }
            },
            RelayRequest::Reset => match self.backend.reset().await {
                Ok(ok) => RelayResponse::Reset { ok },
                Err(e) => {
                    warn!(error = %e, "Reset failed");
                    RelayResponse::failed(e.to_string())
                }
            },
        }
    }

    /// Parse and dispatch an arbitrary inbound message. Anything that is not a
    /// recognised request gets the "unknown message" failure.
    pub async fn handle_value(&self, message: Value) -> RelayResponse {
        match serde_json::from_value::<RelayRequest>(message.clone()) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, message = %message, "Unknown message");
                RelayResponse::unknown_message()
            }
        }
    }
}

/// HTTP surface: `GET /` health check, `POST /message` for relay requests.
pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/message", post(message_handler))
        .with_state(relay)
}

async fn message_handler(State(relay): State<Arc<Relay>>, body: String) -> Json<RelayResponse> {
    match serde_json::from_str::<Value>(&body) {
        Ok(message) => Json(relay.handle_value(message).await),
        Err(e) => {
            warn!(error = %e, "Message body is not JSON");
            Json(RelayResponse::unknown_message())
        }
    }
}
