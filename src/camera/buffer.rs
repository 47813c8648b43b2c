use parking_lot::Mutex;
use std::sync::Arc;

use super::types::Frame;

/// Latest-frame slot shared between the capture thread and its readers.
///
/// Each push replaces the previous frame. Frames are wrapped in `Arc` so the
/// dispatcher can hold on to the frame it is encoding while the capture
/// thread keeps publishing new ones.
#[derive(Default)]
pub struct FrameBuffer {
    latest: Mutex<Option<Arc<Frame>>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a frame, replacing the previous one.
    pub fn push(&self, frame: Frame) {
        *self.latest.lock() = Some(Arc::new(frame));
    }

    /// The most recently pushed frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.lock().clone()
    }

    /// Drop the held frame; readers see `None` until the next push.
    pub fn clear(&self) {
        *self.latest.lock() = None;
    }
}
