// Live statistics: per-activation counters, rolling FPS, and the recent
// detections list shown beside the video.

pub mod aggregator;
pub mod log;

pub use aggregator::{SessionStats, StatsAggregator};
pub use log::{DetectionLog, DetectionLogEntry};
