// Relay message contract.
//
// The scraping side cannot reach the backend directly; it sends one of these requests
// to the relay, which performs the HTTP call and answers with a `RelayResponse`.
// Both are JSON objects tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::StagedRecord;

pub const UNKNOWN_MESSAGE: &str = "Unknown message type";

/// The subset of a review the scorer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    #[serde(default)]
    pub review_title: String,
    #[serde(default)]
    pub review_body: String,
    #[serde(default)]
    pub verified_purchase: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayRequest {
    Ping,
    UploadBatch { payload: Vec<StagedRecord> },
    GetScores { payload: Vec<ScoreInput> },
    Reset,
}

impl RelayRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayRequest::Ping => "ping",
            RelayRequest::UploadBatch { .. } => "upload_batch",
            RelayRequest::GetScores { .. } => "get_scores",
            RelayRequest::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayResponse {
    Pong {
        time: DateTime<Utc>,
    },
    Uploaded {
        ok: bool,
        status: u16,
        body: ResponseBody,
    },
    Scores {
        ok: bool,
        scores: Vec<u8>,
    },
    Reset {
        ok: bool,
    },
    Failed {
        error: String,
    },
}

impl RelayResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        RelayResponse::Failed {
            error: error.into(),
        }
    }

    pub fn unknown_message() -> Self {
        Self::failed(UNKNOWN_MESSAGE)
    }

    pub fn is_ok(&self) -> bool {
        match self {
            RelayResponse::Pong { .. } => true,
            RelayResponse::Uploaded { ok, .. }
            | RelayResponse::Scores { ok, .. }
            | RelayResponse::Reset { ok } => *ok,
            RelayResponse::Failed { .. } => false,
        }
    }
}

/// A backend response body: JSON when it parses, the raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    Parsed(Value),
    Raw(String),
}

impl ResponseBody {
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => ResponseBody::Parsed(value),
            Err(_) => ResponseBody::Raw(text.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Parsed(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_type_tagged() {
        let value = serde_json::to_value(RelayRequest::Reset).unwrap();
        assert_eq!(value, json!({"type": "reset"}));

        let parsed: RelayRequest =
            serde_json::from_value(json!({"type": "get_scores", "payload": []})).unwrap();
        assert_eq!(parsed, RelayRequest::GetScores { payload: vec![] });
    }

    #[test]
    fn unknown_request_type_does_not_parse() {
        let parsed = serde_json::from_value::<RelayRequest>(json!({"type": "force_inject"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn body_falls_back_to_raw_text() {
        assert_eq!(
            ResponseBody::from_text(r#"{"inserted": 3}"#),
            ResponseBody::Parsed(json!({"inserted": 3}))
        );
        assert_eq!(
            ResponseBody::from_text("Internal Server Error"),
            ResponseBody::Raw("Internal Server Error".to_string())
        );
    }

    #[test]
    fn failed_responses_are_not_ok() {
        assert!(!RelayResponse::unknown_message().is_ok());
        assert!(RelayResponse::Reset { ok: true }.is_ok());
        assert!(!RelayResponse::Uploaded {
            ok: false,
            status: 500,
            body: ResponseBody::Raw(String::new()),
        }
        .is_ok());
    }
}
