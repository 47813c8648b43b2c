use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::inference::types::InferenceResult;

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Frames per second for `frames` over `elapsed`, rounded to one decimal.
pub fn fps_over(frames: u64, elapsed: Duration) -> f64 {
    let ms = elapsed.as_secs_f64() * 1000.0;
    if ms <= 0.0 {
        return 0.0;
    }
    round1(frames as f64 * 1000.0 / ms)
}

/// Fixed-length FPS window.
///
/// The window opens on the first `record` or `report` call. Once a full
/// window has elapsed, `report` recomputes the figure and reopens the window.
/// Between windows the last figure is retained.
#[derive(Debug, Clone)]
pub struct FpsWindow {
    length: Duration,
    opened_at: Option<Instant>,
    frames: u64,
    fps: f64,
}

impl FpsWindow {
    pub fn new(length: Duration) -> Self {
        Self {
            length,
            opened_at: None,
            frames: 0,
            fps: 0.0,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.opened_at.get_or_insert(now);
        self.frames += 1;
    }

    pub fn report(&mut self, now: Instant) -> f64 {
        let opened_at = *self.opened_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(opened_at);
        if elapsed >= self.length {
            self.fps = fps_over(self.frames, elapsed);
            self.frames = 0;
            self.opened_at = Some(now);
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Summary persisted on the session record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub helmets_detected: u64,
    pub avg_fps: f64,
    /// Top confidence of the most recent result, as a percentage.
    pub avg_confidence: f64,
}

/// Live counters for one activation. Fed only by the dispatch-result handler.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    helmet_label: String,
    frames_processed: u64,
    helmets_detected: u64,
    latest_confidence: f64,
    fps: FpsWindow,
}

impl StatsAggregator {
    pub fn new(helmet_label: impl Into<String>, fps_window: Duration) -> Self {
        Self {
            helmet_label: helmet_label.into(),
            frames_processed: 0,
            helmets_detected: 0,
            latest_confidence: 0.0,
            fps: FpsWindow::new(fps_window),
        }
    }

    /// Fold one successful dispatch into the counters.
    pub fn record_result(&mut self, result: &InferenceResult, now: Instant) {
        self.frames_processed += 1;
        self.helmets_detected += result.count_category(&self.helmet_label);
        self.latest_confidence = result.top_confidence().map_or(0.0, |c| c * 100.0);
        self.fps.record(now);
    }

    /// Advance the FPS window; returns the current figure.
    pub fn report_fps(&mut self, now: Instant) -> f64 {
        self.fps.report(now)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn helmets_detected(&self) -> u64 {
        self.helmets_detected
    }

    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    /// Latest top confidence as a percentage.
    pub fn latest_confidence(&self) -> f64 {
        self.latest_confidence
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_processed: self.frames_processed,
            helmets_detected: self.helmets_detected,
            avg_fps: self.fps.fps(),
            avg_confidence: round1(self.latest_confidence),
        }
    }
}
