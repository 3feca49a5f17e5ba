pub mod error;

pub use error::{BackendError, Result};

use std::time::Duration;

use arc_common::{ResponseBody, ScoreInput, StagedRecord};
use serde::{Deserialize, Serialize};

/// Outcome of a `POST /ingest` that reached the backend, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReply {
    pub ok: bool,
    pub status: u16,
    pub body: ResponseBody,
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    records: &'a [StagedRecord],
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    reviews: &'a [ScoreInput],
}

#[derive(Deserialize)]
struct ScoreResponse {
    scores: Vec<u8>,
}

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload a batch via `POST /ingest`.
    ///
    /// Only transport failures are errors. A non-success status still yields a reply, with
    /// the body parsed as JSON when possible and kept as raw text otherwise.
    pub async fn ingest(&self, records: &[StagedRecord]) -> Result<IngestReply> {
        let endpoint = format!("{}/ingest", self.base_url);
        tracing::debug!(count = records.len(), "Uploading batch");

        let resp = self
            .client
            .post(&endpoint)
            .json(&IngestRequest { records })
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        tracing::info!(status = status.as_u16(), count = records.len(), "Upload result");

        Ok(IngestReply {
            ok: status.is_success(),
            status: status.as_u16(),
            body: ResponseBody::from_text(&text),
        })
    }

    /// Score reviews via `POST /score`. Returns one score per input, in input order.
    pub async fn score(&self, inputs: &[ScoreInput]) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let endpoint = format!("{}/score", self.base_url);
        let resp = self
            .client
            .post(&endpoint)
            .json(&ScoreRequest { reviews: inputs })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        let parsed: ScoreResponse = serde_json::from_str(&text)?;
        if parsed.scores.len() != inputs.len() {
            return Err(BackendError::Parse(format!(
                "expected {} scores, backend returned {}",
                inputs.len(),
                parsed.scores.len()
            )));
        }
        Ok(parsed.scores)
    }

    /// Ask the backend to reset its session state via `POST /reset`.
    /// Returns whether the backend answered with a success status.
    pub async fn reset(&self) -> Result<bool> {
        let endpoint = format!("{}/reset", self.base_url);
        let resp = self.client.post(&endpoint).send().await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Backend reset returned non-success status");
        }
        Ok(status.is_success())
    }
}
