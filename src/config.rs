// Configuration: JSON file with per-field defaults plus environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::camera::dummy::DummyProducer;
use crate::camera::types::CaptureFormat;
use crate::inference::encode::EncodeSettings;

/// Overrides `inference.base_url` when set.
pub const INFERENCE_URL_ENV: &str = "LIVE_DETECT_INFERENCE_URL";

/// Device name that selects the synthetic camera.
pub const DUMMY_DEVICE: &str = "dummy";

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Detection service connection and payload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub jpeg_quality: u8,
    pub max_frame_width: u32,
}

impl InferenceConfig {
    /// Full URL frames are posted to.
    pub fn predict_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.endpoint.starts_with('/') {
            format!("{base}{}", self.endpoint)
        } else {
            format!("{base}/{}", self.endpoint)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            quality: self.jpeg_quality,
            max_width: self.max_frame_width,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            endpoint: predict_wire::WEBCAM_ENDPOINT.to_string(),
            timeout_ms: 10_000,
            jpeg_quality: 80,
            max_frame_width: 640,
        }
    }
}

/// Sampling cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum spacing between sampled frames.
    pub sample_interval_ms: u64,
    /// Period of the host tick (display refresh).
    pub tick_interval_ms: u64,
}

impl ThrottleConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 190,
            tick_interval_ms: 16,
        }
    }
}

/// Live statistics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub fps_window_ms: u64,
    /// Label counted towards `helmets_detected` (case-insensitive).
    pub helmet_label: String,
}

impl StatsConfig {
    pub fn fps_window(&self) -> Duration {
        Duration::from_millis(self.fps_window_ms)
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            fps_window_ms: 1000,
            helmet_label: "helmet".to_string(),
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub update_interval_ms: u64,
    /// Store the annotated frame with each detection record.
    pub attach_annotated_image: bool,
}

impl SessionConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 2000,
            attach_annotated_image: false,
        }
    }
}

/// Where sessions and detections are written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
    Rest {
        url: String,
        api_key: String,
    },
}

/// Capture device settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
}

impl CameraConfig {
    pub fn format(&self) -> CaptureFormat {
        CaptureFormat {
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }

    /// Whether the synthetic camera should be used.
    pub fn uses_dummy(&self) -> bool {
        self.device == DUMMY_DEVICE || DummyProducer::is_enabled()
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        let format = CaptureFormat::default();
        Self {
            device: DUMMY_DEVICE.to_string(),
            width: format.width,
            height: format.height,
            fps: format.fps,
        }
    }
}

/// Top-level configuration file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub inference: InferenceConfig,
    pub throttle: ThrottleConfig,
    pub stats: StatsConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub camera: CameraConfig,
    /// How often the host logs a status line.
    pub report_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inference: InferenceConfig::default(),
            throttle: ThrottleConfig::default(),
            stats: StatsConfig::default(),
            session: SessionConfig::default(),
            store: StoreConfig::default(),
            camera: CameraConfig::default(),
            report_interval_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file, returning defaults when the file is missing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(INFERENCE_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.inference.base_url = url.to_string();
            }
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        let url = &self.inference.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "inference.base_url must be an http(s) URL, got '{url}'"
            )));
        }
        if !(1..=100).contains(&self.inference.jpeg_quality) {
            return invalid("inference.jpeg_quality must be between 1 and 100");
        }
        if self.inference.timeout_ms == 0 {
            return invalid("inference.timeout_ms must be greater than zero");
        }
        if self.throttle.sample_interval_ms == 0 {
            return invalid("throttle.sample_interval_ms must be greater than zero");
        }
        if self.throttle.tick_interval_ms == 0 {
            return invalid("throttle.tick_interval_ms must be greater than zero");
        }
        if self.stats.fps_window_ms == 0 {
            return invalid("stats.fps_window_ms must be greater than zero");
        }
        if self.stats.helmet_label.trim().is_empty() {
            return invalid("stats.helmet_label must not be empty");
        }
        if self.session.update_interval_ms == 0 {
            return invalid("session.update_interval_ms must be greater than zero");
        }
        if self.report_interval_ms == 0 {
            return invalid("report_interval_ms must be greater than zero");
        }
        match &self.store {
            StoreConfig::File { path } if path.as_os_str().is_empty() => {
                invalid("store.path must not be empty")
            }
            StoreConfig::Rest { url, .. } if url.trim().is_empty() => {
                invalid("store.url must not be empty")
            }
            _ => Ok(()),
        }
    }
}
