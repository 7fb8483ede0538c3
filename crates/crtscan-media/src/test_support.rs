//! Synthetic frame sources and scripted oracles for tests.
//!
//! Every synthetic frame is filled with a colour encoding its frame index, so
//! any crop of it still identifies the frame it came from.

use async_trait::async_trait;
use crtscan_models::{BoundingBox, DetectionHit};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{MediaError, MediaResult};
use crate::oracle::{ClassifierOracles, DetectionOracle, OracleRegistry, OracleSet, ScoreOracle, SegmentationOracle};
use crate::source::{FrameImage, FrameSource, SourceOpener};

pub const FRAME_SIDE: u32 = 8;

pub fn encode_index(index: u64) -> RgbImage {
    let colour = Rgb([(index >> 16) as u8, (index >> 8) as u8, index as u8]);
    RgbImage::from_pixel(FRAME_SIDE, FRAME_SIDE, colour)
}

pub fn decode_index(image: &RgbImage) -> u64 {
    let Rgb([r, g, b]) = *image.get_pixel(0, 0);
    ((r as u64) << 16) | ((g as u64) << 8) | b as u64
}

/// `count` encoded frames with indices `0..count`.
pub fn frames(count: u64) -> Vec<FrameImage> {
    (0..count).map(|i| Arc::new(encode_index(i))).collect()
}

/// Constant-rate source of encoded frames.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    total: u64,
    fps: f64,
    reported_fps: f64,
    read: u64,
    fail_at: Option<u64>,
}

impl SyntheticSource {
    pub fn new(total: u64, fps: f64) -> Self {
        Self {
            total,
            fps,
            reported_fps: fps,
            read: 0,
            fail_at: None,
        }
    }

    pub fn with_reported_fps(mut self, fps: f64) -> Self {
        self.reported_fps = fps;
        self
    }

    /// Fail with a decode error when frame `index` is read.
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn read_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        if self.fail_at == Some(self.read) {
            return Err(MediaError::source_failed("synthetic decode failure"));
        }
        if self.read >= self.total {
            return Ok(None);
        }
        let frame = encode_index(self.read);
        self.read += 1;
        Ok(Some(frame))
    }

    fn position_ms(&self) -> f64 {
        self.read as f64 * 1000.0 / self.fps
    }

    fn frame_count(&self) -> u64 {
        self.total
    }

    fn reported_fps(&self) -> f64 {
        self.reported_fps
    }
}

/// Opens a fresh [`SyntheticSource`] for every path.
pub struct SyntheticOpener {
    pub template: SyntheticSource,
}

#[async_trait]
impl SourceOpener for SyntheticOpener {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        if path.to_string_lossy().contains("missing") {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        Ok(Box::new(self.template.clone()))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

/// Detector hitting a fixed set of frame indices.
#[derive(Default)]
pub struct ScriptedDetector {
    hits: HashSet<u64>,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<u64>>>,
}

impl ScriptedDetector {
    pub fn hits_at(indices: &[u64]) -> Self {
        Self {
            hits: indices.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn hits_in(range: std::ops::RangeInclusive<u64>) -> Self {
        Self {
            hits: range.collect(),
            ..Self::default()
        }
    }

    pub fn extend_hits(mut self, range: std::ops::RangeInclusive<u64>) -> Self {
        self.hits.extend(range);
        self
    }

    /// Fail the `call`-th invocation (0-based).
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Frame indices of every batch received, in call order.
    pub fn batches(&self) -> Vec<Vec<u64>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl DetectionOracle for ScriptedDetector {
    async fn detect_batch(
        &self,
        images: &[FrameImage],
        _confidence_threshold: f64,
    ) -> MediaResult<Vec<Option<DetectionHit>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_call == Some(call) {
            return Err(MediaError::oracle_failed("scripted", "detector unavailable"));
        }

        let indices: Vec<u64> = images.iter().map(|img| decode_index(img)).collect();
        self.batches.lock().unwrap().push(indices.clone());

        let side = FRAME_SIDE as f64;
        Ok(indices
            .into_iter()
            .map(|i| {
                self.hits
                    .contains(&i)
                    .then(|| DetectionHit::new(BoundingBox::new(0.0, 0.0, side, side), 0.9, 0))
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "scripted_detector"
    }
}

/// Detector that drops the last answer of every batch.
pub struct ShortDetector;

#[async_trait]
impl DetectionOracle for ShortDetector {
    async fn detect_batch(&self, images: &[FrameImage], _: f64) -> MediaResult<Vec<Option<DetectionHit>>> {
        Ok(vec![None; images.len().saturating_sub(1)])
    }

    fn name(&self) -> &'static str {
        "short_detector"
    }
}

type ScoreFn = dyn Fn(u64) -> f64 + Send + Sync;

/// Score oracle computing its answer from the frame index.
pub struct ScriptedScore {
    score: Box<ScoreFn>,
    calls: AtomicUsize,
}

impl ScriptedScore {
    pub fn new(score: impl Fn(u64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            score: Box::new(score),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(move |_| value)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreOracle for ScriptedScore {
    async fn classify_batch(&self, images: &[FrameImage]) -> MediaResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(images.iter().map(|img| (self.score)(decode_index(img))).collect())
    }

    fn name(&self) -> &'static str {
        "scripted_score"
    }
}

type MaskFn = dyn Fn(u64) -> u32 + Send + Sync;

/// Segmentation oracle returning 10x10 masks with a scripted number of
/// non-zero pixels per frame index.
pub struct ScriptedMask {
    nonzero: Box<MaskFn>,
    calls: AtomicUsize,
}

impl ScriptedMask {
    pub fn new(nonzero: impl Fn(u64) -> u32 + Send + Sync + 'static) -> Self {
        Self {
            nonzero: Box::new(nonzero),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_| 0)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentationOracle for ScriptedMask {
    async fn segment_batch(&self, images: &[FrameImage]) -> MediaResult<Vec<GrayImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(images
            .iter()
            .map(|img| {
                let count = (self.nonzero)(decode_index(img)).min(100);
                GrayImage::from_fn(10, 10, |x, y| {
                    if y * 10 + x < count {
                        Luma([255])
                    } else {
                        Luma([0])
                    }
                })
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "scripted_mask"
    }
}

/// Classifier oracles that report every screen as clean.
pub fn clean_classifiers() -> ClassifierOracles {
    ClassifierOracles {
        broken: Arc::new(ScriptedScore::constant(0.1)),
        phosphor: Arc::new(ScriptedScore::constant(0.1)),
        cone: Arc::new(ScriptedMask::empty()),
    }
}

/// Registry with the given detector for both video types and clean
/// classifiers for screen footage.
pub fn registry_with(detector: Arc<dyn DetectionOracle>) -> OracleRegistry {
    OracleRegistry::new()
        .register(
            crtscan_models::VideoType::Screen,
            OracleSet::with_classifiers(detector.clone(), clean_classifiers()),
        )
        .register(crtscan_models::VideoType::Fog, OracleSet::detection_only(detector))
}
