//! Inspection oracles backed by the model service.

use std::sync::Arc;

use async_trait::async_trait;
use crtscan_media::{
    ClassifierOracles, DetectionOracle, FrameImage, MediaResult, OracleRegistry, OracleSet, ScoreOracle,
    SegmentationOracle,
};
use crtscan_models::{DetectionHit, VideoType};
use image::GrayImage;

use crate::client::MlClient;
use crate::types::ScoreEndpoint;

/// Screen / fog detector.
pub struct HttpDetector {
    client: Arc<MlClient>,
    model: String,
}

impl HttpDetector {
    pub fn new(client: Arc<MlClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl DetectionOracle for HttpDetector {
    async fn detect_batch(
        &self,
        images: &[FrameImage],
        confidence_threshold: f64,
    ) -> MediaResult<Vec<Option<DetectionHit>>> {
        self.client
            .detect(&self.model, images, confidence_threshold)
            .await
            .map_err(|e| e.into_oracle_error(self.name()))
    }

    fn name(&self) -> &'static str {
        "http_detector"
    }
}

/// Broken-screen or phosphor-residue classifier.
pub struct HttpScoreOracle {
    client: Arc<MlClient>,
    endpoint: ScoreEndpoint,
    model: String,
}

impl HttpScoreOracle {
    pub fn new(client: Arc<MlClient>, endpoint: ScoreEndpoint, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ScoreOracle for HttpScoreOracle {
    async fn classify_batch(&self, images: &[FrameImage]) -> MediaResult<Vec<f64>> {
        self.client
            .classify(self.endpoint, &self.model, images)
            .await
            .map_err(|e| e.into_oracle_error(self.name()))
    }

    fn name(&self) -> &'static str {
        self.endpoint.oracle_name()
    }
}

/// Cone-residue segmenter.
pub struct HttpSegmenter {
    client: Arc<MlClient>,
    model: String,
}

impl HttpSegmenter {
    pub fn new(client: Arc<MlClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SegmentationOracle for HttpSegmenter {
    async fn segment_batch(&self, images: &[FrameImage]) -> MediaResult<Vec<GrayImage>> {
        self.client
            .segment(&self.model, images)
            .await
            .map_err(|e| e.into_oracle_error(self.name()))
    }

    fn name(&self) -> &'static str {
        "cone_segmenter"
    }
}

/// Oracle sets for every video type, all served by `client`.
///
/// Detection models are named after the video type; screen footage also gets
/// the `broken`, `phosphor` and `cone` models.
pub fn http_registry(client: Arc<MlClient>) -> OracleRegistry {
    let classifiers = ClassifierOracles {
        broken: Arc::new(HttpScoreOracle::new(client.clone(), ScoreEndpoint::Broken, "broken")),
        phosphor: Arc::new(HttpScoreOracle::new(client.clone(), ScoreEndpoint::Phosphor, "phosphor")),
        cone: Arc::new(HttpSegmenter::new(client.clone(), "cone")),
    };

    VideoType::ALL.iter().fold(OracleRegistry::new(), |registry, video_type| {
        let detector: Arc<dyn DetectionOracle> = Arc::new(HttpDetector::new(client.clone(), video_type.as_str()));
        let set = if video_type.classifies_sections() {
            OracleSet::with_classifiers(detector, classifiers.clone())
        } else {
            OracleSet::detection_only(detector)
        };
        registry.register(*video_type, set)
    })
}
