use thiserror::Error;

/// Camera subsystem errors.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("frame capture failed: {0}")]
    Capture(String),
}

impl CameraError {
    /// Whether the error means the device could not be acquired at all.
    ///
    /// Permission failures count: from the caller's point of view there is
    /// no camera to use until the user grants access.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CameraError::DeviceUnavailable(_) | CameraError::PermissionDenied(_)
        )
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
