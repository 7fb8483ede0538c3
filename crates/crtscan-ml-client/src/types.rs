//! ML service request/response types.

use crtscan_models::DetectionHit;
use serde::{Deserialize, Serialize};

/// A batch of images for one model. Images are base64-encoded PNG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Model name on the service side
    pub model: String,
    pub images: Vec<String>,
    /// Only sent to detection endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

/// Best detection per image, `null` when nothing passed the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub detections: Vec<Option<DetectionHit>>,
}

/// One probability per image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub scores: Vec<f64>,
}

/// Single-channel mask, row-major, base64-encoded raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskPayload {
    pub width: u32,
    pub height: u32,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub masks: Vec<MaskPayload>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}

/// Classification endpoints of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEndpoint {
    Broken,
    Phosphor,
}

impl ScoreEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            ScoreEndpoint::Broken => "/classify/broken",
            ScoreEndpoint::Phosphor => "/classify/phosphor",
        }
    }

    pub fn oracle_name(&self) -> &'static str {
        match self {
            ScoreEndpoint::Broken => "broken_classifier",
            ScoreEndpoint::Phosphor => "phosphor_classifier",
        }
    }
}
