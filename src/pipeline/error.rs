use thiserror::Error;

use crate::camera::error::CameraError;

/// Reasons activation is refused. Everything after activation is non-fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("live detection requires a signed-in user")]
    Unauthenticated,

    #[error(transparent)]
    Camera(#[from] CameraError),
}

impl PipelineError {
    /// Whether activation failed only because no camera could be acquired.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Camera(e) if e.is_unavailable())
    }
}
