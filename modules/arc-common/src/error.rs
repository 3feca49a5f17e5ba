use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArcError>;

#[derive(Error, Debug)]
pub enum ArcError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
