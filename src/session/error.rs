use thiserror::Error;

use super::types::SessionId;

/// Persistence failures. Never fatal to the live pipeline.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("session not found: {0}")]
    NotFound(SessionId),

    #[error("session already ended: {0}")]
    AlreadyEnded(SessionId),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
