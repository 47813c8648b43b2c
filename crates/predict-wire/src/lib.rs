//! Wire format shared with the detection service.
//!
//! Both `POST /predict` and `POST /predict-webcam` answer with the same JSON
//! body: a success flag, the annotated frame as base64-encoded PNG, and the
//! list of boxes the model found.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multipart field name the service reads the image from.
pub const IMAGE_FIELD: &str = "file";

/// Endpoint used for live camera frames.
pub const WEBCAM_ENDPOINT: &str = "/predict-webcam";

/// Endpoint used for one-shot uploads (helmet and seatbelt models).
pub const UPLOAD_ENDPOINT: &str = "/predict";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Errors raised while decoding a predict response.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service reported an unsuccessful prediction")]
    Rejected,

    #[error("annotated image is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("annotated image is not a PNG")]
    NotPng,
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, WireError>;

/// A single box as reported by the service.
///
/// Geometry is in pixels of the submitted image. Older service builds omit
/// it, so every coordinate is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDetection {
    pub label: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
}

/// Body of a predict response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub image: String,
    #[serde(default)]
    pub detections: Vec<WireDetection>,
}

/// A response that passed validation: PNG bytes plus detections.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPrediction {
    pub png: Vec<u8>,
    pub detections: Vec<WireDetection>,
}

impl PredictResponse {
    /// Parse a raw response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Check the success flag and decode the annotated image.
    pub fn decode(self) -> Result<DecodedPrediction> {
        if !self.success {
            return Err(WireError::Rejected);
        }
        let png = decode_png_base64(&self.image)?;
        Ok(DecodedPrediction {
            png,
            detections: self.detections,
        })
    }
}

/// Decode a base64 PNG, accepting an optional `data:image/png;base64,` prefix.
pub fn decode_png_base64(encoded: &str) -> Result<Vec<u8>> {
    let payload = encoded
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .unwrap_or(encoded)
        .trim();
    let bytes = STANDARD.decode(payload)?;
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return Err(WireError::NotPng);
    }
    Ok(bytes)
}

/// Encode PNG bytes as a data URL, the form the detections table stores.
pub fn png_data_url(png: &[u8]) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png))
}
