// Relay seam.
//
// RelayChannel carries one type-tagged request to the relay and returns its reply.
// UploadTransport is what the batch queue talks to; RelayTransport implements it
// by wrapping a batch in an `upload_batch` request.

use std::sync::Arc;
use std::time::Duration;

use arc_common::{RelayRequest, RelayResponse, ResponseBody};
use async_trait::async_trait;

use crate::error::TransportError;
use crate::queue::Batch;

#[async_trait]
pub trait RelayChannel: Send + Sync {
    async fn request(&self, request: RelayRequest) -> Result<RelayResponse, TransportError>;
}

/// Talks to a relay process over HTTP (`POST {relay_url}/message`).
pub struct HttpRelayChannel {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelayChannel {
    pub fn new(relay_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/message", relay_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl RelayChannel for HttpRelayChannel {
    async fn request(&self, request: RelayRequest) -> Result<RelayResponse, TransportError> {
        let resp = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::RelayStatus(status.as_u16()));
        }

        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// In-process relay: no hop, the relay calls the backend directly.
#[async_trait]
impl RelayChannel for arc_relay::Relay {
    async fn request(&self, request: RelayRequest) -> Result<RelayResponse, TransportError> {
        Ok(self.handle(request).await)
    }
}

/// What the backend said about an uploaded batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub ok: bool,
    pub status: u16,
    pub body: ResponseBody,
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Deliver one batch. `Err` means it never reached the backend; a reached backend
    /// that refused the batch is an `Ok` receipt with `ok == false`.
    async fn send(&self, batch: Batch) -> Result<UploadReceipt, TransportError>;
}

pub struct RelayTransport {
    channel: Arc<dyn RelayChannel>,
}

impl RelayTransport {
    pub fn new(channel: Arc<dyn RelayChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl UploadTransport for RelayTransport {
    async fn send(&self, batch: Batch) -> Result<UploadReceipt, TransportError> {
        let request = RelayRequest::UploadBatch { payload: batch };
        match self.channel.request(request).await? {
            RelayResponse::Uploaded { ok, status, body } => Ok(UploadReceipt { ok, status, body }),
            RelayResponse::Failed { error } => Err(TransportError::Relay(error)),
            other => Err(TransportError::Unexpected {
                request: "upload_batch",
                reply: format!("{other:?}"),
            }),
        }
    }
}
