//! Batched vision oracles.
//!
//! Oracles are stateless, already-initialized services handed to the
//! pipeline at construction. Every call must return exactly one answer per
//! input image, in input order; the `*_checked` helpers enforce that and
//! never issue a call with an empty batch.

use async_trait::async_trait;
use crtscan_models::{DetectionHit, VideoType};
use image::GrayImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

use crate::error::{MediaError, MediaResult};
use crate::source::FrameImage;

/// Locates the target object in full frames.
#[async_trait]
pub trait DetectionOracle: Send + Sync {
    async fn detect_batch(
        &self,
        images: &[FrameImage],
        confidence_threshold: f64,
    ) -> MediaResult<Vec<Option<DetectionHit>>>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Scores cropped screens with a probability in `[0, 1]`.
#[async_trait]
pub trait ScoreOracle: Send + Sync {
    async fn classify_batch(&self, images: &[FrameImage]) -> MediaResult<Vec<f64>>;

    fn name(&self) -> &'static str;
}

/// Segments residue regions in cropped screens. Non-zero pixels are residue.
#[async_trait]
pub trait SegmentationOracle: Send + Sync {
    async fn segment_batch(&self, images: &[FrameImage]) -> MediaResult<Vec<GrayImage>>;

    fn name(&self) -> &'static str;
}

/// Oracles used by the classifier.
#[derive(Clone)]
pub struct ClassifierOracles {
    pub broken: Arc<dyn ScoreOracle>,
    pub phosphor: Arc<dyn ScoreOracle>,
    pub cone: Arc<dyn SegmentationOracle>,
}

/// Everything needed to inspect one kind of footage.
#[derive(Clone)]
pub struct OracleSet {
    pub detector: Arc<dyn DetectionOracle>,
    /// Absent for footage whose sections are only located.
    pub classifiers: Option<ClassifierOracles>,
}

impl OracleSet {
    pub fn detection_only(detector: Arc<dyn DetectionOracle>) -> Self {
        Self {
            detector,
            classifiers: None,
        }
    }

    pub fn with_classifiers(detector: Arc<dyn DetectionOracle>, classifiers: ClassifierOracles) -> Self {
        Self {
            detector,
            classifiers: Some(classifiers),
        }
    }
}

/// Oracle sets keyed by video type.
#[derive(Clone, Default)]
pub struct OracleRegistry {
    sets: HashMap<VideoType, OracleSet>,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, video_type: VideoType, set: OracleSet) -> Self {
        self.sets.insert(video_type, set);
        self
    }

    /// Oracle set for `video_type`, checking classifiers exist when needed.
    pub fn get(&self, video_type: VideoType) -> MediaResult<OracleSet> {
        let set = self
            .sets
            .get(&video_type)
            .cloned()
            .ok_or_else(|| MediaError::internal(format!("No oracles registered for {}", video_type)))?;

        if video_type.classifies_sections() && set.classifiers.is_none() {
            return Err(MediaError::internal(format!(
                "{} footage requires classification oracles",
                video_type
            )));
        }

        Ok(set)
    }
}

/// Run the detection oracle over `images`, validating the response length.
pub async fn detect_checked(
    oracle: &dyn DetectionOracle,
    images: &[FrameImage],
    confidence_threshold: f64,
) -> MediaResult<Vec<Option<DetectionHit>>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }
    let started = Instant::now();
    let hits = oracle.detect_batch(images, confidence_threshold).await?;
    observe_call(oracle.name(), images.len(), started);
    ensure_cardinality(oracle.name(), images.len(), hits)
}

/// Run a score oracle over `images`, validating the response length.
pub async fn classify_checked(oracle: &dyn ScoreOracle, images: &[FrameImage]) -> MediaResult<Vec<f64>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }
    let started = Instant::now();
    let scores = oracle.classify_batch(images).await?;
    observe_call(oracle.name(), images.len(), started);
    ensure_cardinality(oracle.name(), images.len(), scores)
}

/// Run a segmentation oracle over `images`, validating the response length.
pub async fn segment_checked(
    oracle: &dyn SegmentationOracle,
    images: &[FrameImage],
) -> MediaResult<Vec<GrayImage>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }
    let started = Instant::now();
    let masks = oracle.segment_batch(images).await?;
    observe_call(oracle.name(), images.len(), started);
    ensure_cardinality(oracle.name(), images.len(), masks)
}

fn ensure_cardinality<T>(oracle: &str, expected: usize, answers: Vec<T>) -> MediaResult<Vec<T>> {
    if answers.len() != expected {
        return Err(MediaError::oracle_cardinality(oracle, expected, answers.len()));
    }
    Ok(answers)
}

fn observe_call(oracle: &'static str, batch: usize, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    metrics::counter!("crtscan_oracle_calls_total", "oracle" => oracle).increment(1);
    metrics::histogram!("crtscan_oracle_batch_seconds", "oracle" => oracle).record(elapsed);
    trace!(oracle, batch, elapsed_s = elapsed, "Oracle batch returned");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frames, ScriptedDetector, ShortDetector};

    #[tokio::test]
    async fn test_empty_batch_skips_oracle() {
        let detector = ScriptedDetector::hits_at(&[]);
        let hits = detect_checked(&detector, &[], 0.8).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(detector.calls(), 0);
    }

    #[tokio::test]
    async fn test_cardinality_mismatch_is_error() {
        let err = detect_checked(&ShortDetector, &frames(3), 0.8).await.unwrap_err();
        assert!(matches!(
            err,
            MediaError::OracleCardinality { expected: 3, got: 2, .. }
        ));
        assert!(err.is_oracle_failure());
    }

    #[test]
    fn test_registry_requires_classifiers_for_screen() {
        let detector: Arc<dyn DetectionOracle> = Arc::new(ScriptedDetector::hits_at(&[]));
        let registry = OracleRegistry::new()
            .register(VideoType::Screen, OracleSet::detection_only(detector.clone()))
            .register(VideoType::Fog, OracleSet::detection_only(detector));

        assert!(registry.get(VideoType::Screen).is_err());
        assert!(registry.get(VideoType::Fog).is_ok());
    }
}
