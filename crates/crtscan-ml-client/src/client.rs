//! ML service HTTP client.

use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use crtscan_media::FrameImage;
use crtscan_models::DetectionHit;
use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::types::{
    BatchRequest, DetectResponse, HealthResponse, MaskPayload, ScoreEndpoint, ScoreResponse, SegmentResponse,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// Delay before the first retry, doubled per attempt
    pub retry_backoff: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout.as_secs()),
            ),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: defaults.retry_backoff,
        }
    }
}

/// Client for the model service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Best screen detection per image.
    pub async fn detect(
        &self,
        model: &str,
        images: &[FrameImage],
        confidence_threshold: f64,
    ) -> MlResult<Vec<Option<DetectionHit>>> {
        let request = BatchRequest {
            model: model.to_string(),
            images: encode_rgb_batch(images)?,
            confidence_threshold: Some(confidence_threshold),
        };
        let response: DetectResponse = self.post_json("/detect", &request).await?;
        Ok(response.detections)
    }

    /// One probability per image from a classification endpoint.
    pub async fn classify(&self, endpoint: ScoreEndpoint, model: &str, images: &[FrameImage]) -> MlResult<Vec<f64>> {
        let request = BatchRequest {
            model: model.to_string(),
            images: encode_rgb_batch(images)?,
            confidence_threshold: None,
        };
        let response: ScoreResponse = self.post_json(endpoint.path(), &request).await?;
        Ok(response.scores)
    }

    /// Cone-residue mask per image.
    pub async fn segment(&self, model: &str, images: &[FrameImage]) -> MlResult<Vec<GrayImage>> {
        let request = BatchRequest {
            model: model.to_string(),
            images: encode_rgb_batch(images)?,
            confidence_threshold: None,
        };
        let response: SegmentResponse = self.post_json("/segment/cone", &request).await?;
        response.masks.into_iter().map(decode_mask).collect()
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(url = %url, "Sending model request");

        let response = self
            .with_retry(|| async {
                let response = self.http.post(&url).json(body).send().await.map_err(|e| {
                    if e.is_timeout() {
                        MlError::Timeout(self.config.timeout.as_secs())
                    } else {
                        MlError::Network(e)
                    }
                })?;

                let status = response.status();
                if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
                    return Err(MlError::ServiceUnavailable(format!("{} returned {}", path, status)));
                }
                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "ML service returned {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| MlError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_backoff * 2u32.pow(attempt);
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

/// Encode frames as base64 PNG.
pub fn encode_rgb_batch(images: &[FrameImage]) -> MlResult<Vec<String>> {
    images
        .iter()
        .map(|image| {
            let mut png = Cursor::new(Vec::new());
            PngEncoder::new(&mut png)
                .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
                .map_err(|e| MlError::Encoding(e.to_string()))?;
            Ok(STANDARD.encode(png.into_inner()))
        })
        .collect()
}

fn decode_mask(mask: MaskPayload) -> MlResult<GrayImage> {
    let bytes = STANDARD
        .decode(mask.data.as_bytes())
        .map_err(|e| MlError::InvalidResponse(format!("mask data: {}", e)))?;
    GrayImage::from_raw(mask.width, mask.height, bytes).ok_or_else(|| {
        MlError::InvalidResponse(format!("mask data does not match {}x{}", mask.width, mask.height))
    })
}
