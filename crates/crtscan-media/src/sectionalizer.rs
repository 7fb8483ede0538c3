//! Section-boundary state machine.
//!
//! Mandatory frames are sent to the detection oracle in fixed-size batches.
//! The first batch containing a hit opens a section; a section closes once
//! the most recent `tail_window` mandatory results hold no hit, or at end of
//! stream. When too many frames are buffered before closure, the section is
//! emitted in unfinished form and buffering continues under the same logical
//! section. Buffers are only mutated after an oracle call has returned.

use crtscan_models::{DetectionHit, FrameTag};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::config::InspectionProfile;
use crate::error::MediaResult;
use crate::oracle::{detect_checked, DetectionOracle};
use crate::sampler::FrameSample;
use crate::source::FrameImage;

/// A sampled frame with its detection result.
#[derive(Debug, Clone)]
pub struct SectionFrame {
    pub sample: FrameSample,
    pub hit: Option<DetectionHit>,
}

impl SectionFrame {
    pub fn index(&self) -> u64 {
        self.sample.index
    }
}

/// One emission of a logical section.
#[derive(Debug, Clone)]
pub struct Section {
    /// Frames in strictly increasing index order.
    pub frames: Vec<SectionFrame>,
    /// More emissions of the same logical section follow.
    pub is_open: bool,
    /// A previous emission of the same logical section exists.
    pub is_continuation: bool,
    /// 0-based order of the logical section within the video.
    pub ordinal: usize,
}

impl Section {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn first_frame_index(&self) -> Option<u64> {
        self.frames.first().map(SectionFrame::index)
    }

    pub fn last_frame_index(&self) -> Option<u64> {
        self.frames.last().map(SectionFrame::index)
    }

    pub fn first_hit(&self) -> Option<&SectionFrame> {
        self.frames.iter().find(|f| f.hit.is_some())
    }

    pub fn last_hit(&self) -> Option<&SectionFrame> {
        self.frames.iter().rev().find(|f| f.hit.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    OutOfSection,
    InSection,
}

/// Groups the tagged frame stream into sections.
pub struct Sectionalizer {
    detector: Arc<dyn DetectionOracle>,
    batch_size: usize,
    confidence_threshold: f64,
    tail_window: usize,
    minimum_positions: usize,
    cache_ceiling: usize,

    state: SectionState,
    pending_mandatory: Vec<FrameSample>,
    pending_maybe: Vec<FrameSample>,
    mandatory: Vec<SectionFrame>,
    maybe: Vec<FrameSample>,
    recent: VecDeque<bool>,
    partially_emitted: bool,
    ordinal: usize,
}

impl Sectionalizer {
    pub fn new(detector: Arc<dyn DetectionOracle>, profile: &InspectionProfile) -> Self {
        Self {
            detector,
            batch_size: profile.batch.detection,
            confidence_threshold: profile.confidence_threshold,
            tail_window: profile.tail_window(),
            minimum_positions: profile.minimum_duration_positions(),
            cache_ceiling: profile.cache_ceiling_frames,
            state: SectionState::OutOfSection,
            pending_mandatory: Vec::new(),
            pending_maybe: Vec::new(),
            mandatory: Vec::new(),
            maybe: Vec::new(),
            recent: VecDeque::new(),
            partially_emitted: false,
            ordinal: 0,
        }
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    /// Frames held for the current section (mandatory + candidates).
    pub fn buffered_frames(&self) -> usize {
        self.mandatory.len() + self.maybe.len()
    }

    /// Feed the next sample. Returns a section emission when one is ready.
    pub async fn push(&mut self, sample: FrameSample) -> MediaResult<Option<Section>> {
        match sample.tag {
            FrameTag::Skip => Ok(None),
            FrameTag::MaybeInclude => {
                self.pending_maybe.push(sample);
                Ok(None)
            }
            FrameTag::MustDetect => {
                self.pending_mandatory.push(sample);
                if self.pending_mandatory.len() < self.batch_size {
                    return Ok(None);
                }
                self.process_batch(false).await
            }
        }
    }

    /// Flush the last partial batch and force-close any open section.
    pub async fn finish(&mut self) -> MediaResult<Option<Section>> {
        self.process_batch(true).await
    }

    async fn process_batch(&mut self, end_of_stream: bool) -> MediaResult<Option<Section>> {
        let images: Vec<FrameImage> = self.pending_mandatory.iter().map(|s| s.pixels.clone()).collect();
        let hits = detect_checked(self.detector.as_ref(), &images, self.confidence_threshold).await?;

        let mandatory = std::mem::take(&mut self.pending_mandatory);
        let maybe = std::mem::take(&mut self.pending_maybe);

        if self.state == SectionState::OutOfSection {
            if !hits.iter().any(Option::is_some) {
                return Ok(None);
            }
            self.state = SectionState::InSection;
            debug!(frame = mandatory.first().map(|s| s.index), "Section opened");
        }

        for (sample, hit) in mandatory.into_iter().zip(hits) {
            if self.recent.len() == self.tail_window {
                self.recent.pop_front();
            }
            self.recent.push_back(hit.is_some());
            self.mandatory.push(SectionFrame { sample, hit });
        }
        self.maybe.extend(maybe);

        if end_of_stream || !self.recent.iter().any(|hit| *hit) {
            let section = self.emit(true).await?;
            self.state = SectionState::OutOfSection;
            return Ok(section);
        }

        if self.buffered_frames() >= self.cache_ceiling {
            return self.emit(false).await;
        }

        Ok(None)
    }

    /// Emit the buffered section, pruned to its hit bounds. For an unfinished
    /// emission, frames after the last hit stay buffered.
    async fn emit(&mut self, closed: bool) -> MediaResult<Option<Section>> {
        let is_continuation = self.partially_emitted;
        let first_hit = self.mandatory.iter().position(|f| f.hit.is_some());
        let last_hit = self.mandatory.iter().rposition(|f| f.hit.is_some());

        let (first_hit, last_hit) = match (first_hit, last_hit) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                if !closed {
                    return Ok(None);
                }
                // A continuation still owes its consumer a closing emission.
                let section = is_continuation.then(|| Section {
                    frames: Vec::new(),
                    is_open: false,
                    is_continuation: true,
                    ordinal: self.ordinal,
                });
                self.close_section(section.is_some());
                return Ok(section);
            }
        };

        if !is_continuation && last_hit - first_hit < self.minimum_positions {
            if closed {
                debug!(
                    first = self.mandatory[first_hit].index(),
                    last = self.mandatory[last_hit].index(),
                    "Discarding section shorter than minimum duration"
                );
                self.close_section(false);
            }
            return Ok(None);
        }

        let start = if is_continuation { 0 } else { first_hit };
        let lower = self.mandatory[start].index();
        let upper = self.mandatory[last_hit].index();
        let inside = |sample: &FrameSample| sample.index < upper && (is_continuation || sample.index > lower);

        let candidates: Vec<FrameImage> = self
            .maybe
            .iter()
            .filter(|s| inside(*s))
            .map(|s| s.pixels.clone())
            .collect();
        let mut candidate_hits = Vec::with_capacity(candidates.len());
        for chunk in candidates.chunks(self.batch_size) {
            candidate_hits.extend(detect_checked(self.detector.as_ref(), chunk, self.confidence_threshold).await?);
        }

        let remainder = self.mandatory.split_off(last_hit + 1);
        let mut frames: Vec<SectionFrame> = std::mem::replace(&mut self.mandatory, remainder)
            .into_iter()
            .skip(start)
            .collect();

        let mut candidate_hits = candidate_hits.into_iter();
        let mut carried = Vec::new();
        for sample in std::mem::take(&mut self.maybe) {
            if inside(&sample) {
                let hit = candidate_hits.next().flatten();
                frames.push(SectionFrame { sample, hit });
            } else if sample.index > upper {
                carried.push(sample);
            }
        }
        frames.sort_by_key(SectionFrame::index);

        let section = Section {
            frames,
            is_open: !closed,
            is_continuation,
            ordinal: self.ordinal,
        };

        debug!(
            ordinal = section.ordinal,
            first = section.first_frame_index(),
            last = section.last_frame_index(),
            frames = section.frames.len(),
            open = section.is_open,
            continuation = is_continuation,
            "Section emitted"
        );

        if closed {
            self.close_section(true);
        } else {
            self.maybe = carried;
            self.partially_emitted = true;
        }

        Ok(Some(section))
    }

    fn close_section(&mut self, emitted: bool) {
        self.mandatory.clear();
        self.maybe.clear();
        self.recent.clear();
        self.partially_emitted = false;
        if emitted {
            self.ordinal += 1;
        }
    }
}
