use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use predict_wire::{DecodedPrediction, PredictResponse, WireDetection};
use serde::{Deserialize, Serialize};

use super::error::{DispatchError, Result};

/// Box geometry in pixels of the submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// One object found by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox: None,
        }
    }

    /// Confidence as a percentage.
    pub fn confidence_pct(&self) -> f64 {
        self.confidence * 100.0
    }

    /// Case-insensitive label comparison.
    pub fn is_category(&self, category: &str) -> bool {
        self.label.to_lowercase() == category.to_lowercase()
    }
}

impl From<WireDetection> for Detection {
    fn from(wire: WireDetection) -> Self {
        let bbox = match (wire.x, wire.y, wire.width, wire.height) {
            (Some(x), Some(y), Some(width), Some(height)) => Some(BoundingBox {
                x,
                y,
                width,
                height,
            }),
            _ => None,
        };
        Self {
            bbox,
            ..Detection::new(wire.label, wire.confidence)
        }
    }
}

/// Annotated frame returned by the service, kept PNG-encoded for display.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl AnnotatedImage {
    /// Validate PNG bytes and read their dimensions.
    pub fn from_png(png: Vec<u8>) -> Result<Self> {
        let (width, height) =
            ImageReader::with_format(Cursor::new(png.as_slice()), ImageFormat::Png)
                .into_dimensions()
                .map_err(|e| DispatchError::Malformed(format!("annotated image: {e}")))?;
        Ok(Self { png, width, height })
    }
}

/// Outcome of one successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub annotated: AnnotatedImage,
    pub detections: Vec<Detection>,
}

impl InferenceResult {
    /// Turn a raw predict response into a result, failing on anything malformed.
    pub fn from_response(response: PredictResponse) -> Result<Self> {
        Self::from_prediction(response.decode()?)
    }

    pub fn from_prediction(prediction: DecodedPrediction) -> Result<Self> {
        Ok(Self {
            annotated: AnnotatedImage::from_png(prediction.png)?,
            detections: prediction.detections.into_iter().map(Detection::from).collect(),
        })
    }

    /// Highest confidence in the batch.
    pub fn top_confidence(&self) -> Option<f64> {
        self.detections
            .iter()
            .map(|d| d.confidence)
            .fold(None, |best, c| Some(best.map_or(c, |b: f64| b.max(c))))
    }

    /// Mean confidence in the batch, `None` when empty.
    pub fn average_confidence(&self) -> Option<f64> {
        if self.detections.is_empty() {
            return None;
        }
        let sum: f64 = self.detections.iter().map(|d| d.confidence).sum();
        Some(sum / self.detections.len() as f64)
    }

    /// Number of detections in `category`.
    pub fn count_category(&self, category: &str) -> u64 {
        self.detections
            .iter()
            .filter(|d| d.is_category(category))
            .count() as u64
    }
}
