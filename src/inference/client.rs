use std::future::Future;

use predict_wire::{PredictResponse, IMAGE_FIELD};
use reqwest::multipart::{Form, Part};

use super::error::{DispatchError, Result};
use super::types::InferenceResult;
use crate::config::InferenceConfig;

/// Remote detection service.
///
/// Implementations must be cheap to share: the dispatcher holds one behind an
/// `Arc` and calls it from spawned tasks.
pub trait InferenceClient: Send + Sync + 'static {
    /// Submit one JPEG-encoded frame and wait for the annotated result.
    fn predict(&self, jpeg: Vec<u8>) -> impl Future<Output = Result<InferenceResult>> + Send;
}

/// `InferenceClient` backed by the HTTP detection service.
pub struct HttpInferenceClient {
    client: reqwest::Client,
    url: String,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.predict_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InferenceClient for HttpInferenceClient {
    async fn predict(&self, jpeg: Vec<u8>) -> Result<InferenceResult> {
        let part = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        InferenceResult::from_response(PredictResponse::from_slice(&body)?)
    }
}
