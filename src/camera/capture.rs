use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info, warn};

use super::buffer::FrameBuffer;
use super::error::{CameraError, Result};
use super::source::FrameSource;
use super::types::{CaptureFormat, DeviceId, Frame};

/// Capture thread gives up after this many failed reads in a row.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Device driver used by a [`CaptureSession`].
///
/// `next_frame` blocks until the device delivers the next frame, so it also
/// paces the capture thread.
pub trait FrameProducer: Send + 'static {
    /// Open the device at the requested format.
    fn open(&mut self, format: &CaptureFormat) -> Result<()>;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Close the device.
    fn close(&mut self);
}

/// Camera capture running on a dedicated thread.
///
/// The thread pulls frames from the producer into a shared [`FrameBuffer`];
/// the pipeline only ever reads the latest one.
pub struct CaptureSession {
    device_id: DeviceId,
    format: CaptureFormat,
    buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    /// Parked here while no capture thread owns it.
    producer: Option<Box<dyn FrameProducer>>,
    thread: Option<JoinHandle<Box<dyn FrameProducer>>>,
}

impl CaptureSession {
    /// Create an idle session; nothing is opened until [`FrameSource::acquire`].
    pub fn new(
        device_id: DeviceId,
        format: CaptureFormat,
        producer: Box<dyn FrameProducer>,
    ) -> Self {
        Self {
            device_id,
            format,
            buffer: Arc::new(FrameBuffer::new()),
            running: Arc::new(AtomicBool::new(false)),
            producer: Some(producer),
            thread: None,
        }
    }

    /// Whether the capture thread is still producing frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn capture_loop(
        device_id: DeviceId,
        mut producer: Box<dyn FrameProducer>,
        buffer: Arc<FrameBuffer>,
        running: Arc<AtomicBool>,
    ) -> Box<dyn FrameProducer> {
        info!("capture thread starting for {device_id}");
        let mut failures = 0u32;
        while running.load(Ordering::Relaxed) {
            match producer.next_frame() {
                Ok(frame) => {
                    failures = 0;
                    buffer.push(frame);
                }
                Err(e) => {
                    failures += 1;
                    warn!("frame capture failed for {device_id}: {e}");
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        error!(
                            "giving up on {device_id} after {failures} consecutive capture failures"
                        );
                        // Readers see no frame rather than a frozen one.
                        buffer.clear();
                        running.store(false, Ordering::Relaxed);
                    }
                }
            }
        }
        producer.close();
        info!("capture thread exiting for {device_id}");
        producer
    }
}

impl FrameSource for CaptureSession {
    fn acquire(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        let mut producer = self.producer.take().ok_or_else(|| {
            CameraError::DeviceUnavailable(format!(
                "{} lost its driver after a capture thread panic",
                self.device_id
            ))
        })?;
        if let Err(e) = producer.open(&self.format) {
            self.producer = Some(producer);
            return Err(e);
        }

        self.buffer.clear();
        self.running.store(true, Ordering::Relaxed);

        let device_id = self.device_id.clone();
        let buffer = Arc::clone(&self.buffer);
        let running = Arc::clone(&self.running);
        let spawned = std::thread::Builder::new()
            .name(format!("capture-{}", self.device_id))
            .spawn(move || Self::capture_loop(device_id, producer, buffer, running));

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                Err(CameraError::Capture(format!(
                    "failed to spawn capture thread: {e}"
                )))
            }
        }
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.buffer.latest()
    }

    /// Stop the capture thread and park the producer for reuse. Idempotent.
    ///
    /// Blocks until the capture thread finishes its current read.
    fn release(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(producer) => self.producer = Some(producer),
                Err(_) => error!("capture thread for {} panicked", self.device_id),
            }
        }
    }

    fn is_acquired(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}
