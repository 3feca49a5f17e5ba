use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoutError>;

/// Failure delivering a request through the relay.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Relay unreachable: {0}")]
    Unreachable(String),

    #[error("Relay returned status {0}")]
    RelayStatus(u16),

    #[error("Relay reported failure: {0}")]
    Relay(String),

    #[error("Unexpected relay reply to {request}: {reply}")]
    Unexpected { request: &'static str, reply: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Unreachable(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Common(#[from] arc_common::ArcError),
}
