use predict_wire::WireError;
use thiserror::Error;

/// Why a single dispatch produced no result. Never fatal to the pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("inference request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("inference service returned HTTP {0}")]
    Status(u16),

    #[error("malformed inference response: {0}")]
    Malformed(String),

    #[error("inference service reported an unsuccessful prediction")]
    Rejected,

    #[error("dispatch task aborted: {0}")]
    Aborted(String),
}

impl From<WireError> for DispatchError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Rejected => DispatchError::Rejected,
            other => DispatchError::Malformed(other.to_string()),
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, DispatchError>;
