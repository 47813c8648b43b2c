use std::time::Instant;

use super::capture::{CaptureSession, FrameProducer};
use super::error::{CameraError, Result};
use super::types::{CaptureFormat, DeviceId, Frame};

const DUMMY_DEVICE_ID: &str = "dummy:test-pattern";

/// A fake camera for running the pipeline without real hardware.
///
/// Produces a moving RGB gradient at the requested resolution, paced to the
/// requested frame rate. Enable via `DUMMY_CAMERA=1`.
pub struct DummyProducer {
    format: CaptureFormat,
    started: Option<Instant>,
    sequence: u64,
    refuse_open: bool,
    paced: bool,
}

impl DummyProducer {
    /// A dummy camera that opens normally and paces frames in real time.
    pub fn new() -> Self {
        Self {
            format: CaptureFormat::default(),
            started: None,
            sequence: 0,
            refuse_open: false,
            paced: true,
        }
    }

    /// A dummy camera whose `open` fails, as if permission were denied.
    pub fn unavailable() -> Self {
        Self {
            refuse_open: true,
            ..Self::new()
        }
    }

    /// Produce frames as fast as they are requested.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Whether the dummy camera is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    /// The stable device ID for the dummy camera.
    pub fn device_id() -> DeviceId {
        DeviceId::new(DUMMY_DEVICE_ID)
    }

    /// Wrap a dummy producer in a ready-to-acquire capture session.
    pub fn session(format: CaptureFormat) -> CaptureSession {
        CaptureSession::new(Self::device_id(), format, Box::new(Self::new()))
    }

    /// Render the gradient for frame number `sequence`.
    pub fn test_pattern(width: u32, height: u32, sequence: u64) -> Vec<u8> {
        let shift = (sequence % 256) as u32;
        let mut data = Vec::with_capacity(Frame::expected_len(width, height));
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(128);
            }
        }
        data
    }
}

impl Default for DummyProducer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProducer for DummyProducer {
    fn open(&mut self, format: &CaptureFormat) -> Result<()> {
        if self.refuse_open {
            return Err(CameraError::PermissionDenied(
                "dummy camera configured as unavailable".to_string(),
            ));
        }
        self.format = *format;
        self.started = Some(Instant::now());
        self.sequence = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let started = self
            .started
            .ok_or_else(|| CameraError::Capture("dummy camera is not open".to_string()))?;
        if self.paced {
            std::thread::sleep(self.format.frame_period());
        }
        let frame = Frame {
            data: Self::test_pattern(self.format.width, self.format.height, self.sequence),
            width: self.format.width,
            height: self.format.height,
            timestamp_us: started.elapsed().as_micros() as u64,
        };
        self.sequence += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.started = None;
    }
}
