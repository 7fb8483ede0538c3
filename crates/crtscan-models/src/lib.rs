//! Shared data models for the CRT inspection pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Inspection jobs and operator metadata
//! - Frame tags and detection hits
//! - Section categories and verdicts
//! - Video types selecting oracle sets
//! - Progress messages and timestamp helpers

pub mod frame;
pub mod job;
pub mod progress;
pub mod timestamp;
pub mod verdict;
pub mod video_type;

// Re-export common types
pub use frame::{BoundingBox, DetectionHit, FrameTag};
pub use job::{InspectionJob, JobId, JobState, OperatorMetadata};
pub use progress::ProgressUpdate;
pub use timestamp::{format_hms, parse_recording_time, RecordingTimeError};
pub use verdict::{ClassificationVerdict, SectionCategory};
pub use video_type::VideoType;
