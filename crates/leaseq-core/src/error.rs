use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed item document: {0}")]
    Malformed(#[from] serde_json::Error),
}
