//! Multi-signal section classifier.
//!
//! Every frame of a section is cropped once around its detection and fed to
//! the broken-screen and phosphor-residue oracles in batches. The last few
//! crops are kept so cone-residue segmentation can run when the section
//! closes. At closure the per-frame signals are reduced by run-length voting:
//! BROKEN > CONE_RESIDUE > PHOSPHOR_RESIDUE > PASS.

use crtscan_models::{ClassificationVerdict, SectionCategory, VideoType};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::InspectionProfile;
use crate::crop::crop_square;
use crate::error::{MediaError, MediaResult};
use crate::oracle::{classify_checked, segment_checked, ClassifierOracles};
use crate::run_length::{last_index_where, longest_run, longest_run_with_tolerance};
use crate::sectionalizer::{Section, SectionFrame};
use crate::source::FrameImage;

/// Residue threshold shared by the broken and phosphor scores.
const SCORE_THRESHOLD: f64 = 0.5;

/// Gap tolerated inside broken / cone runs.
const RUN_TOLERANCE: usize = 1;

/// The screen fills about 1/1.2² of a square crop.
const SCREEN_AREA_DIVISOR: f64 = 1.44;

/// Score of one frame, `None` when the frame had no detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameScore {
    pub index: u64,
    pub timestamp_ms: f64,
    pub value: Option<f64>,
}

/// Cone segmentation result of one tail frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConeReading {
    pub index: u64,
    pub timestamp_ms: f64,
    /// Non-zero mask pixels, `None` when the frame had no detection.
    pub residue_pixels: Option<u64>,
    pub mask_pixels: u64,
}

impl ConeReading {
    /// Residue area as a percentage of the screen area inside the crop.
    pub fn residue_percentage(&self) -> f64 {
        match self.residue_pixels {
            Some(pixels) if self.mask_pixels > 0 => {
                pixels as f64 / (self.mask_pixels as f64 / SCREEN_AREA_DIVISOR) * 100.0
            }
            _ => 0.0,
        }
    }
}

/// Per-frame evidence behind a verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionSignals {
    pub broken: Vec<FrameScore>,
    pub phosphor: Vec<FrameScore>,
    pub cone: Vec<ConeReading>,
}

/// Verdict plus the key frame and the evidence it was derived from.
#[derive(Debug, Clone)]
pub struct SectionVerdict {
    pub verdict: ClassificationVerdict,
    /// Uncropped key frame, if it is part of the latest partial section.
    pub key_frame: Option<FrameImage>,
    pub signals: SectionSignals,
}

/// Frames waiting for one oracle call. Frames without a crop are held aside
/// and merged back in index order when the batch returns.
struct BatchCache {
    capacity: usize,
    crops: Vec<(u64, f64, FrameImage)>,
    absent: Vec<(u64, f64)>,
}

impl BatchCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            crops: Vec::with_capacity(capacity),
            absent: Vec::new(),
        }
    }

    fn push(&mut self, index: u64, timestamp_ms: f64, crop: Option<FrameImage>) {
        match crop {
            Some(crop) => self.crops.push((index, timestamp_ms, crop)),
            None => self.absent.push((index, timestamp_ms)),
        }
    }

    fn is_full(&self) -> bool {
        self.crops.len() >= self.capacity
    }

    fn is_empty(&self) -> bool {
        self.crops.is_empty() && self.absent.is_empty()
    }

    fn images(&self) -> Vec<FrameImage> {
        self.crops.iter().map(|(_, _, crop)| crop.clone()).collect()
    }

    /// Pair answers with their frames, merge absent frames, clear the cache.
    fn join<T>(&mut self, answers: Vec<T>) -> Vec<(u64, f64, Option<T>)> {
        let mut joined: Vec<(u64, f64, Option<T>)> = self
            .crops
            .drain(..)
            .zip(answers)
            .map(|((index, ts, _), answer)| (index, ts, Some(answer)))
            .chain(self.absent.drain(..).map(|(index, ts)| (index, ts, None)))
            .collect();
        joined.sort_by_key(|(index, _, _)| *index);
        joined
    }
}

struct TailFrame {
    index: u64,
    timestamp_ms: f64,
    crop: Option<FrameImage>,
}

#[derive(Clone, Copy)]
struct HitBound {
    index: u64,
    timestamp_ms: f64,
}

/// Produces one verdict per logical section from its (partial) emissions.
pub struct Classifier {
    video_type: VideoType,
    oracles: Option<ClassifierOracles>,
    verdict_window: usize,
    run_threshold: usize,
    cone_tail_len: usize,
    cone_batch: usize,

    broken_cache: BatchCache,
    phosphor_cache: BatchCache,
    broken: Vec<FrameScore>,
    phosphor: Vec<FrameScore>,
    tail: VecDeque<TailFrame>,
    first_hit: Option<HitBound>,
    last_hit: Option<HitBound>,
    first_hit_image: Option<FrameImage>,
    latest_partial: Vec<SectionFrame>,
}

impl Classifier {
    pub fn new(oracles: Option<ClassifierOracles>, profile: &InspectionProfile) -> MediaResult<Self> {
        if profile.video_type.classifies_sections() && oracles.is_none() {
            return Err(MediaError::internal(format!(
                "{} footage requires classification oracles",
                profile.video_type
            )));
        }

        Ok(Self {
            video_type: profile.video_type,
            oracles,
            verdict_window: profile.verdict_window(),
            run_threshold: profile.run_threshold(),
            cone_tail_len: profile.cone_tail_frames(),
            cone_batch: profile.batch.cone,
            broken_cache: BatchCache::new(profile.batch.broken),
            phosphor_cache: BatchCache::new(profile.batch.phosphor),
            broken: Vec::new(),
            phosphor: Vec::new(),
            tail: VecDeque::new(),
            first_hit: None,
            last_hit: None,
            first_hit_image: None,
            latest_partial: Vec::new(),
        })
    }

    /// Feed one emission of a section. Returns the verdict when the emission
    /// closes its logical section.
    pub async fn consume(&mut self, section: Section) -> MediaResult<Option<SectionVerdict>> {
        for frame in section.frames.iter().filter(|f| f.hit.is_some()) {
            let bound = HitBound {
                index: frame.index(),
                timestamp_ms: frame.sample.timestamp_ms,
            };
            if self.first_hit.is_none() {
                self.first_hit = Some(bound);
                self.first_hit_image = Some(frame.sample.pixels.clone());
            }
            self.last_hit = Some(bound);
        }

        if let Some(oracles) = self.oracles.clone().filter(|_| self.video_type.classifies_sections()) {
            self.score_frames(&oracles, &section.frames).await?;
            if !section.is_open {
                self.flush_scores(&oracles).await?;
            }
        }

        if !section.frames.is_empty() {
            self.latest_partial = section.frames;
        }

        if section.is_open {
            return Ok(None);
        }

        let verdict = match self.oracles.clone().filter(|_| self.video_type.classifies_sections()) {
            Some(oracles) => self.arbitrate(&oracles, section.ordinal).await,
            None => Ok(self.locate_only(section.ordinal)),
        };
        self.reset();
        verdict
    }

    async fn score_frames(&mut self, oracles: &ClassifierOracles, frames: &[SectionFrame]) -> MediaResult<()> {
        for frame in frames {
            let crop = frame
                .hit
                .as_ref()
                .and_then(|hit| crop_square(&frame.sample.pixels, &hit.bbox));
            let (index, ts) = (frame.index(), frame.sample.timestamp_ms);

            self.broken_cache.push(index, ts, crop.clone());
            if self.broken_cache.is_full() {
                let scores = Self::run_scores(&mut self.broken_cache, oracles.broken.as_ref()).await?;
                self.broken.extend(scores);
            }

            self.phosphor_cache.push(index, ts, crop.clone());
            if self.phosphor_cache.is_full() {
                let scores = Self::run_scores(&mut self.phosphor_cache, oracles.phosphor.as_ref()).await?;
                self.phosphor.extend(scores);
            }

            if self.tail.len() == self.cone_tail_len {
                self.tail.pop_front();
            }
            self.tail.push_back(TailFrame {
                index,
                timestamp_ms: ts,
                crop,
            });
        }
        Ok(())
    }

    async fn flush_scores(&mut self, oracles: &ClassifierOracles) -> MediaResult<()> {
        if !self.broken_cache.is_empty() {
            let scores = Self::run_scores(&mut self.broken_cache, oracles.broken.as_ref()).await?;
            self.broken.extend(scores);
        }
        if !self.phosphor_cache.is_empty() {
            let scores = Self::run_scores(&mut self.phosphor_cache, oracles.phosphor.as_ref()).await?;
            self.phosphor.extend(scores);
        }
        Ok(())
    }

    async fn run_scores(
        cache: &mut BatchCache,
        oracle: &dyn crate::oracle::ScoreOracle,
    ) -> MediaResult<Vec<FrameScore>> {
        let answers = classify_checked(oracle, &cache.images()).await?;
        Ok(cache
            .join(answers)
            .into_iter()
            .map(|(index, timestamp_ms, value)| FrameScore {
                index,
                timestamp_ms,
                value,
            })
            .collect())
    }

    /// Segment the tail crops. Only called once the section has closed.
    async fn segment_tail(&mut self, oracles: &ClassifierOracles) -> MediaResult<Vec<ConeReading>> {
        let mut readings = Vec::with_capacity(self.tail.len());
        let mut cache = BatchCache::new(self.cone_batch);
        let tail_len = self.tail.len();

        for (i, frame) in self.tail.drain(..).enumerate() {
            cache.push(frame.index, frame.timestamp_ms, frame.crop);
            if cache.is_full() || i + 1 == tail_len {
                let masks = segment_checked(oracles.cone.as_ref(), &cache.images()).await?;
                readings.extend(cache.join(masks).into_iter().map(|(index, timestamp_ms, mask)| {
                    ConeReading {
                        index,
                        timestamp_ms,
                        residue_pixels: mask
                            .as_ref()
                            .map(|m| m.pixels().filter(|p| p.0[0] != 0).count() as u64),
                        mask_pixels: mask.as_ref().map_or(0, |m| m.width() as u64 * m.height() as u64),
                    }
                }));
            }
        }
        Ok(readings)
    }

    async fn arbitrate(&mut self, oracles: &ClassifierOracles, ordinal: usize) -> MediaResult<Option<SectionVerdict>> {
        let (first, last) = match (self.first_hit, self.last_hit) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                warn!(ordinal, "Closed section carried no detection, no verdict produced");
                return Ok(None);
            }
        };

        let cone = self.segment_tail(oracles).await?;

        let (category, key, metric) = if let Some(key) = self.broken_key() {
            (SectionCategory::Broken, key, 0.0)
        } else if let Some(reading) = self.cone_key(&cone) {
            (
                SectionCategory::ConeResidue,
                (reading.index, reading.timestamp_ms),
                reading.residue_percentage(),
            )
        } else {
            let (residue, key) = self.phosphor_key(last);
            let category = if residue {
                SectionCategory::PhosphorResidue
            } else {
                SectionCategory::Pass
            };
            (category, key, 0.0)
        };

        debug!(
            ordinal,
            category = %category,
            key_frame = key.0,
            broken = self.broken.len(),
            phosphor = self.phosphor.len(),
            cone = cone.len(),
            "Section classified"
        );

        let verdict = ClassificationVerdict {
            section_index: ordinal,
            category,
            metric,
            key_frame_index: key.0,
            key_timestamp_ms: key.1,
            section_start_index: first.index,
            section_end_index: last.index,
            section_start_ms: first.timestamp_ms,
            section_end_ms: last.timestamp_ms,
        };

        Ok(Some(SectionVerdict {
            key_frame: self.key_frame_image(key.0),
            verdict,
            signals: SectionSignals {
                broken: std::mem::take(&mut self.broken),
                phosphor: std::mem::take(&mut self.phosphor),
                cone,
            },
        }))
    }

    /// Verdict for footage whose sections are only located.
    fn locate_only(&mut self, ordinal: usize) -> Option<SectionVerdict> {
        let (first, last) = (self.first_hit?, self.last_hit?);
        Some(SectionVerdict {
            verdict: ClassificationVerdict {
                section_index: ordinal,
                category: SectionCategory::FogDetected,
                metric: 0.0,
                key_frame_index: first.index,
                key_timestamp_ms: first.timestamp_ms,
                section_start_index: first.index,
                section_end_index: last.index,
                section_start_ms: first.timestamp_ms,
                section_end_ms: last.timestamp_ms,
            },
            key_frame: self.first_hit_image.take(),
            signals: SectionSignals::default(),
        })
    }

    /// Key frame of a broken tail: the end of the longest broken run, if that
    /// run beats the longest not-broken run. Absent scores count for both.
    fn broken_key(&self) -> Option<(u64, f64)> {
        let window = tail_slice(&self.broken, self.verdict_window);
        let broken = longest_run_with_tolerance(window, RUN_TOLERANCE, |s| {
            s.value.map_or(true, |v| v > SCORE_THRESHOLD)
        });
        let intact = longest_run_with_tolerance(window, RUN_TOLERANCE, |s| {
            s.value.map_or(true, |v| v < SCORE_THRESHOLD)
        });

        if broken.len <= intact.len {
            return None;
        }
        let score = &window[broken.last?];
        Some((score.index, score.timestamp_ms))
    }

    /// Cone residue reading at the end of the longest residue run, if that
    /// run beats the clean run and is long enough. Absent readings count for
    /// neither.
    fn cone_key<'a>(&self, readings: &'a [ConeReading]) -> Option<&'a ConeReading> {
        let window = tail_slice(readings, self.verdict_window);
        let residue = longest_run_with_tolerance(window, RUN_TOLERANCE, |r| {
            r.residue_pixels.map_or(false, |n| n > 0)
        });
        let clean = longest_run_with_tolerance(window, RUN_TOLERANCE, |r| {
            r.residue_pixels.map_or(false, |n| n == 0)
        });

        if residue.len > clean.len && residue.len >= self.run_threshold {
            residue.last.map(|i| &window[i])
        } else {
            None
        }
    }

    /// Phosphor decision over the whole section: residue when the longest
    /// strictly clean run is at most `run_threshold` frames.
    fn phosphor_key(&self, last_hit: HitBound) -> (bool, (u64, f64)) {
        let is_clean = |s: &FrameScore| s.value.map_or(false, |v| v < SCORE_THRESHOLD);
        let clean = longest_run(&self.phosphor, is_clean);

        if clean.len <= self.run_threshold {
            let key = last_index_where(&self.phosphor, |s| s.value.map_or(false, |v| v >= SCORE_THRESHOLD))
                .map(|i| (self.phosphor[i].index, self.phosphor[i].timestamp_ms))
                .unwrap_or((last_hit.index, last_hit.timestamp_ms));
            (true, key)
        } else {
            let key = clean
                .last
                .map(|i| (self.phosphor[i].index, self.phosphor[i].timestamp_ms))
                .unwrap_or((last_hit.index, last_hit.timestamp_ms));
            (false, key)
        }
    }

    fn key_frame_image(&self, index: u64) -> Option<FrameImage> {
        self.latest_partial
            .iter()
            .find(|f| f.index() == index)
            .map(|f| f.sample.pixels.clone())
    }

    fn reset(&mut self) {
        self.broken_cache = BatchCache::new(self.broken_cache.capacity);
        self.phosphor_cache = BatchCache::new(self.phosphor_cache.capacity);
        self.broken.clear();
        self.phosphor.clear();
        self.tail.clear();
        self.first_hit = None;
        self.last_hit = None;
        self.first_hit_image = None;
        self.latest_partial.clear();
    }
}

fn tail_slice<T>(items: &[T], len: usize) -> &[T] {
    &items[items.len().saturating_sub(len)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::FrameSample;
    use crate::test_support::{clean_classifiers, encode_index, ScriptedMask, ScriptedScore, FRAME_SIDE};
    use crtscan_models::{BoundingBox, DetectionHit, FrameTag};
    use std::sync::Arc;

    fn profile() -> InspectionProfile {
        InspectionProfile::for_video_type(VideoType::Screen)
    }

    fn frame(index: u64, detected: bool) -> SectionFrame {
        let side = FRAME_SIDE as f64;
        SectionFrame {
            sample: FrameSample {
                index,
                timestamp_ms: index as f64 * 100.0,
                pixels: Arc::new(encode_index(index)),
                tag: FrameTag::MustDetect,
            },
            hit: detected.then(|| DetectionHit::new(BoundingBox::new(0.0, 0.0, side, side), 0.9, 0)),
        }
    }

    fn section(range: std::ops::Range<u64>, is_open: bool, is_continuation: bool) -> Section {
        Section {
            frames: range.map(|i| frame(i, true)).collect(),
            is_open,
            is_continuation,
            ordinal: 0,
        }
    }

    fn oracles(broken: ScriptedScore, phosphor: ScriptedScore, cone: ScriptedMask) -> ClassifierOracles {
        ClassifierOracles {
            broken: Arc::new(broken),
            phosphor: Arc::new(phosphor),
            cone: Arc::new(cone),
        }
    }

    async fn classify(oracles: ClassifierOracles, sections: Vec<Section>) -> Vec<SectionVerdict> {
        let mut classifier = Classifier::new(Some(oracles), &profile()).unwrap();
        let mut verdicts = Vec::new();
        for section in sections {
            verdicts.extend(classifier.consume(section).await.unwrap());
        }
        verdicts
    }

    #[tokio::test]
    async fn test_clean_section_passes() {
        let verdicts = classify(clean_classifiers(), vec![section(10..50, false, false)]).await;
        assert_eq!(verdicts.len(), 1);

        let verdict = &verdicts[0].verdict;
        assert_eq!(verdict.category, SectionCategory::Pass);
        assert_eq!(verdict.section_start_index, 10);
        assert_eq!(verdict.section_end_index, 49);
        assert_eq!(verdict.key_frame_index, 49);
        assert!((verdict.key_timestamp_ms - 4900.0).abs() < 1e-9);
        assert_eq!(verdict.metric, 0.0);
        assert!(verdicts[0].key_frame.is_some());
        assert_eq!(verdicts[0].signals.broken.len(), 40);
    }

    #[tokio::test]
    async fn test_broken_tail_wins() {
        let broken = ScriptedScore::new(|i| if i >= 44 { 0.9 } else { 0.1 });
        let verdicts = classify(
            oracles(broken, ScriptedScore::constant(0.1), ScriptedMask::empty()),
            vec![section(10..50, false, false)],
        )
        .await;

        assert_eq!(verdicts[0].verdict.category, SectionCategory::Broken);
        assert_eq!(verdicts[0].verdict.key_frame_index, 49);
    }

    #[tokio::test]
    async fn test_broken_outranks_cone_residue() {
        let broken = ScriptedScore::new(|i| if i >= 44 { 0.9 } else { 0.1 });
        let cone = ScriptedMask::new(|i| if i >= 40 { 30 } else { 0 });
        let verdicts = classify(
            oracles(broken, ScriptedScore::constant(0.9), cone),
            vec![section(10..50, false, false)],
        )
        .await;

        assert_eq!(verdicts[0].verdict.category, SectionCategory::Broken);
    }

    #[tokio::test]
    async fn test_cone_residue_metric() {
        let cone = ScriptedMask::new(|i| if i >= 40 { 36 } else { 0 });
        let verdicts = classify(
            oracles(ScriptedScore::constant(0.1), ScriptedScore::constant(0.9), cone),
            vec![section(10..50, false, false)],
        )
        .await;

        let verdict = &verdicts[0].verdict;
        assert_eq!(verdict.category, SectionCategory::ConeResidue);
        assert_eq!(verdict.key_frame_index, 49);
        // 36 of a 100-pixel mask whose screen area is 100 / 1.44
        assert!((verdict.metric - 51.84).abs() < 1e-9);
        assert_eq!(verdicts[0].signals.cone.len(), profile().cone_tail_frames());
    }

    #[tokio::test]
    async fn test_short_cone_run_is_not_residue() {
        let cone = ScriptedMask::new(|i| if i >= 45 { 36 } else { 0 });
        let verdicts = classify(
            oracles(ScriptedScore::constant(0.1), ScriptedScore::constant(0.1), cone),
            vec![section(10..50, false, false)],
        )
        .await;
        assert_eq!(verdicts[0].verdict.category, SectionCategory::Pass);
    }

    #[tokio::test]
    async fn test_phosphor_residue_without_contiguous_evidence() {
        // Alternating residue: no clean run is longer than one frame.
        let phosphor = ScriptedScore::new(|i| if i % 2 == 0 { 0.9 } else { 0.2 });
        let verdicts = classify(
            oracles(ScriptedScore::constant(0.1), phosphor, ScriptedMask::empty()),
            vec![section(10..50, false, false)],
        )
        .await;

        let verdict = &verdicts[0].verdict;
        assert_eq!(verdict.category, SectionCategory::PhosphorResidue);
        assert_eq!(verdict.key_frame_index, 48);
    }

    #[tokio::test]
    async fn test_undetected_frames_skip_oracles() {
        let broken = Arc::new(ScriptedScore::constant(0.1));
        let oracles = ClassifierOracles {
            broken: broken.clone(),
            phosphor: Arc::new(ScriptedScore::constant(0.1)),
            cone: Arc::new(ScriptedMask::empty()),
        };
        let mut frames: Vec<SectionFrame> = (0..40).map(|i| frame(i, true)).collect();
        frames.extend((40..50).map(|i| frame(i, i % 3 != 0)));
        frames.push(frame(50, true));
        let section = Section {
            frames,
            is_open: false,
            is_continuation: false,
            ordinal: 0,
        };

        let verdicts = classify(oracles, vec![section]).await;
        let signals = &verdicts[0].signals;
        assert_eq!(signals.broken.len(), 51);
        assert!(signals.broken.windows(2).all(|w| w[0].index < w[1].index));
        assert_eq!(signals.broken.iter().filter(|s| s.value.is_none()).count(), 3);
        // 48 detected crops in batches of 32
        assert_eq!(broken.calls(), 2);
    }

    #[tokio::test]
    async fn test_partial_sections_yield_single_verdict() {
        let cone = Arc::new(ScriptedMask::empty());
        let oracles = ClassifierOracles {
            broken: Arc::new(ScriptedScore::constant(0.1)),
            phosphor: Arc::new(ScriptedScore::constant(0.1)),
            cone: cone.clone(),
        };
        let mut classifier = Classifier::new(Some(oracles), &profile()).unwrap();

        assert!(classifier.consume(section(10..40, true, false)).await.unwrap().is_none());
        assert_eq!(cone.calls(), 0);
        let verdict = classifier.consume(section(40..60, false, true)).await.unwrap().unwrap();

        assert_eq!(verdict.verdict.section_start_index, 10);
        assert_eq!(verdict.verdict.section_end_index, 59);
        assert_eq!(verdict.signals.phosphor.len(), 50);
        assert_eq!(cone.calls(), profile().cone_tail_frames());
    }

    #[tokio::test]
    async fn test_key_frame_outside_latest_partial_has_no_image() {
        // Clean run ends early; residue in the last partial.
        let phosphor = ScriptedScore::new(|i| if i < 30 { 0.1 } else { 0.9 });
        let mut classifier = Classifier::new(
            Some(oracles(ScriptedScore::constant(0.1), phosphor, ScriptedMask::empty())),
            &profile(),
        )
        .unwrap();

        classifier.consume(section(10..30, true, false)).await.unwrap();
        let verdict = classifier.consume(section(30..40, false, true)).await.unwrap().unwrap();

        assert_eq!(verdict.verdict.category, SectionCategory::Pass);
        assert_eq!(verdict.verdict.key_frame_index, 29);
        assert!(verdict.key_frame.is_none());
    }

    #[tokio::test]
    async fn test_empty_closing_continuation() {
        let mut classifier = Classifier::new(Some(clean_classifiers()), &profile()).unwrap();
        classifier.consume(section(10..40, true, false)).await.unwrap();
        let closing = Section {
            frames: Vec::new(),
            is_open: false,
            is_continuation: true,
            ordinal: 0,
        };
        let verdict = classifier.consume(closing).await.unwrap().unwrap();
        assert_eq!(verdict.verdict.section_end_index, 39);
        assert_eq!(verdict.signals.broken.len(), 30);
        assert!(verdict.key_frame.is_some());
    }

    #[tokio::test]
    async fn test_fog_sections_are_located_only() {
        let fog = InspectionProfile::for_video_type(VideoType::Fog);
        let mut classifier = Classifier::new(None, &fog).unwrap();
        let verdict = classifier
            .consume(section(5..25, false, false))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(verdict.verdict.category, SectionCategory::FogDetected);
        assert_eq!(verdict.verdict.key_frame_index, 5);
        assert!(verdict.key_frame.is_some());
        assert!(verdict.signals.broken.is_empty());
    }

    #[test]
    fn test_screen_requires_oracles() {
        assert!(Classifier::new(None, &profile()).is_err());
    }
}
