use std::sync::Arc;

use super::error::Result;
use super::types::Frame;

/// A camera the pipeline samples frames from.
///
/// Implementations own an exclusive hardware resource between `acquire` and
/// `release`. `release` must be idempotent.
pub trait FrameSource: Send {
    /// Open the device and start producing frames.
    fn acquire(&mut self) -> Result<()>;

    /// The most recently captured frame, or `None` before the first one arrives.
    fn current_frame(&self) -> Option<Arc<Frame>>;

    /// Stop capture and give the device back. May block while the device
    /// winds down; async callers run it on the blocking pool.
    fn release(&mut self);

    /// Whether the device is currently held.
    fn is_acquired(&self) -> bool;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn acquire(&mut self) -> Result<()> {
        (**self).acquire()
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        (**self).current_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_acquired(&self) -> bool {
        (**self).is_acquired()
    }
}

/// Scoped ownership of an acquired [`FrameSource`].
///
/// The device is released exactly once: on [`CaptureGuard::release`], or when
/// the guard is dropped on any other exit path.
pub struct CaptureGuard<S: FrameSource> {
    source: S,
    held: bool,
}

impl<S: FrameSource> CaptureGuard<S> {
    /// Acquire `source`. On failure the source is released before returning.
    pub fn acquire(mut source: S) -> Result<Self> {
        if let Err(e) = source.acquire() {
            source.release();
            return Err(e);
        }
        Ok(Self { source, held: true })
    }

    /// Latest frame, or `None` once released.
    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        if !self.held {
            return None;
        }
        self.source.current_frame()
    }

    /// Release the device. Idempotent.
    pub fn release(&mut self) {
        if self.held {
            self.source.release();
            self.held = false;
            tracing::debug!("camera released");
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl<S: FrameSource> Drop for CaptureGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}
