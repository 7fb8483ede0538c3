//! Adaptive frame sampler.
//!
//! Converts a raw frame source into a reduced-rate tagged stream. The
//! container frame rate is not trusted: the sampler reads a fixed number of
//! leading frames, derives the observed rate from their timestamps and
//! replays the buffered frames afterwards, so no seek is needed.

use crtscan_models::FrameTag;
use image::RgbImage;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::InspectionProfile;
use crate::error::MediaResult;
use crate::source::{FrameImage, FrameSource};

/// One retained frame of the sampled stream.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// 0-based index in the underlying video
    pub index: u64,
    pub timestamp_ms: f64,
    pub pixels: FrameImage,
    pub tag: FrameTag,
}

/// Tag for the frame at `index`.
///
/// Mandatory frames sit on multiples of `detect_gap`; candidate frames sit on
/// multiples of `maybe_gap` within the first `ratio` sub-slots after them.
pub fn tag_for(index: u64, detect_gap: u64, maybe_gap: u64, ratio: u64) -> FrameTag {
    let offset = index % detect_gap;
    if offset == 0 {
        FrameTag::MustDetect
    } else if offset % maybe_gap == 0 && offset / maybe_gap < ratio {
        FrameTag::MaybeInclude
    } else {
        FrameTag::Skip
    }
}

/// Forward-only, non-restartable stream of tagged samples.
pub struct FrameSampler {
    source: Box<dyn FrameSource>,
    replay: VecDeque<(f64, RgbImage)>,
    next_index: u64,
    observed_fps: f64,
    detect_gap: u64,
    maybe_gap: u64,
    ratio: u64,
    exhausted: bool,
}

impl FrameSampler {
    /// Probe the leading frames of `source` and set up the sampling gaps.
    pub async fn new(mut source: Box<dyn FrameSource>, profile: &InspectionProfile) -> MediaResult<Self> {
        let mut replay = VecDeque::with_capacity(profile.warmup_frames);
        let mut exhausted = false;

        while replay.len() < profile.warmup_frames {
            let timestamp_ms = source.position_ms();
            match source.read_frame().await {
                Ok(Some(frame)) => replay.push_back((timestamp_ms, frame)),
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, frames = replay.len(), "Frame source failed while probing");
                    exhausted = true;
                    break;
                }
            }
        }

        let elapsed_ms = source.position_ms();
        let observed_fps = if !replay.is_empty() && elapsed_ms > 0.0 {
            replay.len() as f64 * 1000.0 / elapsed_ms
        } else if source.reported_fps() > 0.0 {
            source.reported_fps()
        } else {
            profile.detection_frequency as f64
        };

        let ratio = profile.magnification_ratio as u64;
        // Halves round to even.
        let detect_gap = ((observed_fps / profile.detection_frequency as f64).round_ties_even() as u64).max(1);
        let maybe_gap = ((detect_gap as f64 / ratio as f64).round_ties_even() as u64).max(1);

        debug!(
            observed_fps,
            reported_fps = source.reported_fps(),
            detect_gap,
            maybe_gap,
            frames = source.frame_count(),
            "Frame sampler ready"
        );

        Ok(Self {
            source,
            replay,
            next_index: 0,
            observed_fps,
            detect_gap,
            maybe_gap,
            ratio,
            exhausted,
        })
    }

    /// Frame rate derived from the warm-up frames.
    pub fn observed_fps(&self) -> f64 {
        self.observed_fps
    }

    pub fn detect_gap(&self) -> u64 {
        self.detect_gap
    }

    pub fn maybe_gap(&self) -> u64 {
        self.maybe_gap
    }

    /// Number of samples expected over the whole video, for progress.
    pub fn expected_samples(&self) -> u64 {
        (self.source.frame_count() / self.detect_gap) * self.ratio
    }

    /// Next retained sample, `None` at end of stream.
    ///
    /// A decode failure is logged and treated as end of stream so that
    /// already-buffered sections still close normally.
    pub async fn next_sample(&mut self) -> Option<FrameSample> {
        loop {
            let (timestamp_ms, frame) = self.next_frame().await?;
            let index = self.next_index;
            self.next_index += 1;

            let tag = tag_for(index, self.detect_gap, self.maybe_gap, self.ratio);
            if !tag.is_retained() {
                continue;
            }

            return Some(FrameSample {
                index,
                timestamp_ms,
                pixels: Arc::new(frame),
                tag,
            });
        }
    }

    async fn next_frame(&mut self) -> Option<(f64, RgbImage)> {
        if let Some(buffered) = self.replay.pop_front() {
            return Some(buffered);
        }
        if self.exhausted {
            return None;
        }

        let timestamp_ms = self.source.position_ms();
        match self.source.read_frame().await {
            Ok(Some(frame)) => Some((timestamp_ms, frame)),
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                warn!(
                    error = %e,
                    index = self.next_index,
                    expected = self.source.frame_count(),
                    "Frame source failed, treating as end of stream"
                );
                self.exhausted = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{decode_index, SyntheticSource};
    use crtscan_models::VideoType;

    fn profile() -> InspectionProfile {
        InspectionProfile::for_video_type(VideoType::Screen)
    }

    async fn collect(mut sampler: FrameSampler) -> Vec<FrameSample> {
        let mut samples = Vec::new();
        while let Some(sample) = sampler.next_sample().await {
            samples.push(sample);
        }
        samples
    }

    #[test]
    fn test_tag_for_gaps() {
        // 30 fps at 3 detections/s with ratio 2: gap 10, candidates at +5
        let tags: Vec<FrameTag> = (0..20).map(|i| tag_for(i, 10, 5, 2)).collect();
        assert_eq!(tags[0], FrameTag::MustDetect);
        assert_eq!(tags[5], FrameTag::MaybeInclude);
        assert_eq!(tags[10], FrameTag::MustDetect);
        assert_eq!(tags[15], FrameTag::MaybeInclude);
        assert_eq!(tags.iter().filter(|t| **t == FrameTag::Skip).count(), 16);
    }

    #[test]
    fn test_tag_for_single_frame_gap() {
        assert!((0..10).all(|i| tag_for(i, 1, 1, 2) == FrameTag::MustDetect));
    }

    #[tokio::test]
    async fn test_observed_fps_overrides_container() {
        // Container claims 60 fps, timestamps say 30.
        let source = SyntheticSource::new(300, 30.0).with_reported_fps(60.0);
        let sampler = FrameSampler::new(Box::new(source), &profile()).await.unwrap();
        assert!((sampler.observed_fps() - 30.0).abs() < 1e-6);
        assert_eq!(sampler.detect_gap(), 10);
        assert_eq!(sampler.maybe_gap(), 5);
        assert_eq!(sampler.expected_samples(), 60);
    }

    #[tokio::test]
    async fn test_gap_halves_round_to_even() {
        // 15 fps: detect gap 5, candidate gap 2.5 rounds down to 2
        let sampler = FrameSampler::new(Box::new(SyntheticSource::new(300, 15.0)), &profile())
            .await
            .unwrap();
        assert_eq!(sampler.detect_gap(), 5);
        assert_eq!(sampler.maybe_gap(), 2);

        // 45 fps: detect gap 15, candidate gap 7.5 rounds up to 8
        let sampler = FrameSampler::new(Box::new(SyntheticSource::new(300, 45.0)), &profile())
            .await
            .unwrap();
        assert_eq!(sampler.detect_gap(), 15);
        assert_eq!(sampler.maybe_gap(), 8);
    }

    #[tokio::test]
    async fn test_mandatory_frames_every_gap() {
        let source = SyntheticSource::new(300, 30.0);
        let samples = collect(FrameSampler::new(Box::new(source), &profile()).await.unwrap()).await;

        let mandatory: Vec<u64> = samples
            .iter()
            .filter(|s| s.tag == FrameTag::MustDetect)
            .map(|s| s.index)
            .collect();
        assert_eq!(mandatory, (0..30).map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(samples.len(), 60);

        // Replayed warm-up frames keep their identity and timestamps.
        for sample in &samples {
            assert_eq!(decode_index(&sample.pixels), sample.index);
            assert!((sample.timestamp_ms - sample.index as f64 * 1000.0 / 30.0).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_short_video_shorter_than_warmup() {
        let source = SyntheticSource::new(40, 30.0);
        let samples = collect(FrameSampler::new(Box::new(source), &profile()).await.unwrap()).await;
        assert_eq!(samples.len(), 8);
        assert_eq!(samples.last().map(|s| s.index), Some(35));
    }

    #[tokio::test]
    async fn test_empty_video() {
        let source = SyntheticSource::new(0, 30.0);
        let mut sampler = FrameSampler::new(Box::new(source), &profile()).await.unwrap();
        assert!((sampler.observed_fps() - 30.0).abs() < 1e-6);
        assert!(sampler.next_sample().await.is_none());
        assert!(sampler.next_sample().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_failure_ends_stream() {
        let source = SyntheticSource::new(300, 30.0).failing_at(150);
        let samples = collect(FrameSampler::new(Box::new(source), &profile()).await.unwrap()).await;
        assert_eq!(samples.last().map(|s| s.index), Some(145));
    }
}
