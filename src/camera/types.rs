use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a capture device (e.g. `dummy:test-pattern`, `/dev/video0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new `DeviceId` from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the inner string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single captured frame from the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Raw pixel data (RGB, row-major, no padding).
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture timestamp in microseconds since the capture session started.
    pub timestamp_us: u64,
}

impl Frame {
    /// Number of bytes an RGB frame of these dimensions occupies.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Whether `data` matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == Self::expected_len(self.width, self.height)
    }
}

/// Requested capture resolution and rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
}

impl CaptureFormat {
    /// Time between two frames at the requested rate.
    pub fn frame_period(&self) -> std::time::Duration {
        if self.fps <= 0.0 {
            return std::time::Duration::from_millis(33);
        }
        std::time::Duration::from_secs_f32(1.0 / self.fps)
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}
