// Test doubles for the scout pipeline.
//
// - RecordingTransport (UploadTransport): records every batch, can fail or lag
// - MockRelay (RelayChannel): logs every request in order, scripted reset replies
//
// Plus helpers for building review records.

use std::sync::Mutex;
use std::time::Duration;

use arc_common::{Record, RelayRequest, RelayResponse, ResponseBody};
use async_trait::async_trait;
use serde_json::json;

use crate::error::TransportError;
use crate::queue::Batch;
use crate::transport::{RelayChannel, UploadReceipt, UploadTransport};

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Accept,
    /// Backend reached but answers 500.
    Reject,
    /// Never reaches the backend.
    Unreachable,
}

pub struct RecordingTransport {
    batches: Mutex<Vec<Batch>>,
    mode: Mutex<TransportMode>,
    latency: Duration,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            mode: Mutex::new(TransportMode::Accept),
            latency: Duration::ZERO,
        }
    }

    /// Each send records its batch, then sleeps this long before replying.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_mode(&self, mode: TransportMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Every batch handed to `send`, including ones that then failed.
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn record_count(&self) -> usize {
        self.batches.lock().unwrap().iter().map(Vec::len).sum()
    }

    /// `review_title` of every sent record, in send order.
    pub fn titles(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .filter_map(|r| r.record.get("review_title"))
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadTransport for RecordingTransport {
    async fn send(&self, batch: Batch) -> Result<UploadReceipt, TransportError> {
        let count = batch.len();
        self.batches.lock().unwrap().push(batch);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match *self.mode.lock().unwrap() {
            TransportMode::Accept => Ok(UploadReceipt {
                ok: true,
                status: 200,
                body: ResponseBody::Parsed(json!({ "inserted": count })),
            }),
            TransportMode::Reject => Ok(UploadReceipt {
                ok: false,
                status: 500,
                body: ResponseBody::Raw("Internal Server Error".to_string()),
            }),
            TransportMode::Unreachable => Err(TransportError::Unreachable(
                "connection refused".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// MockRelay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReply {
    Ok,
    NotOk,
    Unreachable,
}

/// Answers relay requests in memory and keeps the full request log.
/// Scores are 80 for verified purchases and 50 otherwise.
pub struct MockRelay {
    log: Mutex<Vec<RelayRequest>>,
    reset_reply: ResetReply,
}

impl MockRelay {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            reset_reply: ResetReply::Ok,
        }
    }

    pub fn with_reset_reply(mut self, reply: ResetReply) -> Self {
        self.reset_reply = reply;
        self
    }

    pub fn requests(&self) -> Vec<RelayRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Request kinds in arrival order, e.g. `["reset", "upload_batch"]`.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().iter().map(RelayRequest::kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

impl Default for MockRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayChannel for MockRelay {
    async fn request(&self, request: RelayRequest) -> Result<RelayResponse, TransportError> {
        self.log.lock().unwrap().push(request.clone());
        match request {
            RelayRequest::Ping => Ok(RelayResponse::Pong {
                time: chrono::Utc::now(),
            }),
            RelayRequest::UploadBatch { payload } => Ok(RelayResponse::Uploaded {
                ok: true,
                status: 200,
                body: ResponseBody::Parsed(json!({ "inserted": payload.len() })),
            }),
            RelayRequest::GetScores { payload } => Ok(RelayResponse::Scores {
                ok: true,
                scores: payload
                    .iter()
                    .map(|p| if p.verified_purchase { 80 } else { 50 })
                    .collect(),
            }),
            RelayRequest::Reset => match self.reset_reply {
                ResetReply::Ok => Ok(RelayResponse::Reset { ok: true }),
                ResetReply::NotOk => Ok(RelayResponse::Reset { ok: false }),
                ResetReply::Unreachable => {
                    Err(TransportError::Unreachable("relay is down".to_string()))
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A review record keyed by `title` under the default key spec.
pub fn review_record(title: &str) -> Record {
    Record::new()
        .with("product_id", "B0TESTASIN")
        .with("author", "Sam")
        .with("review_title", title)
        .with("review_body", format!("Body of {title}"))
        .with("verified_purchase", true)
}
