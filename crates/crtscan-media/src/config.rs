//! Inspection thresholds per video type.

use crtscan_models::VideoType;

use crate::error::{MediaError, MediaResult};

/// Oracle batch sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizes {
    pub detection: usize,
    pub broken: usize,
    pub phosphor: usize,
    pub cone: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            detection: 2,
            broken: 32,
            phosphor: 32,
            cone: 1,
        }
    }
}

impl BatchSizes {
    /// Create batch sizes from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detection: env_or("INSPECT_BATCH_DETECTION", defaults.detection),
            broken: env_or("INSPECT_BATCH_BROKEN", defaults.broken),
            phosphor: env_or("INSPECT_BATCH_PHOSPHOR", defaults.phosphor),
            cone: env_or("INSPECT_BATCH_CONE", defaults.cone),
        }
    }
}

fn env_or(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Threshold constants for one kind of footage.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionProfile {
    pub video_type: VideoType,
    /// Mandatory detection attempts per second of video
    pub detection_frequency: u32,
    /// Extra candidate frames kept per detection interval
    pub magnification_ratio: u32,
    /// Seconds without a hit that close a section
    pub tail_secs: u32,
    /// Shortest section kept, in seconds
    pub minimum_duration_secs: u32,
    /// Buffered frames (mandatory + candidate) that force a partial flush
    pub cache_ceiling_frames: usize,
    /// Minimum detector confidence
    pub confidence_threshold: f64,
    /// Leading frames read to estimate the real frame rate
    pub warmup_frames: usize,
    pub batch: BatchSizes,
}

impl InspectionProfile {
    /// Default profile for a video type.
    pub fn for_video_type(video_type: VideoType) -> Self {
        let magnification_ratio = 2;
        let (detection_frequency, minimum_duration_secs, confidence_threshold) = match video_type {
            VideoType::Screen => (3, 6, 0.8),
            VideoType::Fog => (6, 2, 0.3),
        };

        Self {
            video_type,
            detection_frequency,
            magnification_ratio,
            tail_secs: 6,
            minimum_duration_secs,
            cache_ceiling_frames: (30 * detection_frequency * magnification_ratio) as usize,
            confidence_threshold,
            warmup_frames: 100,
            batch: BatchSizes::default(),
        }
    }

    pub fn with_batch_sizes(mut self, batch: BatchSizes) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_minimum_duration_secs(mut self, secs: u32) -> Self {
        self.minimum_duration_secs = secs;
        self
    }

    pub fn with_cache_ceiling(mut self, frames: usize) -> Self {
        self.cache_ceiling_frames = frames;
        self
    }

    /// Check the constants are mutually consistent.
    pub fn validate(&self) -> MediaResult<()> {
        if self.detection_frequency == 0 || self.magnification_ratio == 0 {
            return Err(MediaError::invalid_profile(
                "detection frequency and magnification ratio must be positive",
            ));
        }
        let batch = &self.batch;
        if batch.detection == 0 || batch.broken == 0 || batch.phosphor == 0 || batch.cone == 0 {
            return Err(MediaError::invalid_profile("batch sizes must be positive"));
        }
        if self.tail_window() == 0 {
            return Err(MediaError::invalid_profile("tail window must be positive"));
        }

        // A partial flush must never fire before the section could close or
        // before the head could reach the minimum duration.
        let per_interval = 1 + self.magnification_ratio as usize;
        let minimum_frames = self.minimum_duration_positions() * per_interval;
        let tail_frames = self.tail_window() * per_interval;
        if self.cache_ceiling_frames <= minimum_frames.max(tail_frames) {
            return Err(MediaError::invalid_profile(format!(
                "cache ceiling {} must exceed {} buffered frames",
                self.cache_ceiling_frames,
                minimum_frames.max(tail_frames)
            )));
        }
        Ok(())
    }

    /// Number of most recent mandatory results checked for section closure.
    pub fn tail_window(&self) -> usize {
        (self.tail_secs * self.detection_frequency) as usize
    }

    /// Minimum distance, in mandatory positions, between first and last hit.
    pub fn minimum_duration_positions(&self) -> usize {
        (self.minimum_duration_secs * self.detection_frequency) as usize
    }

    /// Samples per second of video (mandatory and candidate frames).
    pub fn samples_per_second(&self) -> usize {
        (self.detection_frequency * self.magnification_ratio) as usize
    }

    /// Trailing frames over which broken / cone runs are compared.
    pub fn verdict_window(&self) -> usize {
        (1.5 * self.samples_per_second() as f64).round() as usize
    }

    /// Trailing frames kept for cone segmentation.
    pub fn cone_tail_frames(&self) -> usize {
        3 * self.samples_per_second()
    }

    /// Minimum cone run length, and the clean-run length at or below which
    /// phosphor residue is flagged.
    pub fn run_threshold(&self) -> usize {
        self.samples_per_second()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_profile_constants() {
        let profile = InspectionProfile::for_video_type(VideoType::Screen);
        assert_eq!(profile.cache_ceiling_frames, 180);
        assert_eq!(profile.tail_window(), 18);
        assert_eq!(profile.minimum_duration_positions(), 18);
        assert_eq!(profile.verdict_window(), 9);
        assert_eq!(profile.cone_tail_frames(), 18);
        assert_eq!(profile.run_threshold(), 6);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_fog_profile_constants() {
        let profile = InspectionProfile::for_video_type(VideoType::Fog);
        assert_eq!(profile.cache_ceiling_frames, 360);
        assert_eq!(profile.tail_window(), 36);
        assert_eq!(profile.minimum_duration_positions(), 12);
        assert!((profile.confidence_threshold - 0.3).abs() < f64::EPSILON);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_small_ceiling() {
        let profile = InspectionProfile::for_video_type(VideoType::Screen).with_cache_ceiling(40);
        assert!(matches!(profile.validate(), Err(MediaError::InvalidProfile(_))));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let profile = InspectionProfile::for_video_type(VideoType::Screen).with_batch_sizes(BatchSizes {
            detection: 0,
            ..BatchSizes::default()
        });
        assert!(profile.validate().is_err());
    }
}
