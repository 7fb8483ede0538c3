#![deny(unreachable_patterns)]
//! Video inspection engine for recycled CRT screens.
//!
//! This crate provides:
//! - FFmpeg-backed frame decoding with an observed frame rate
//! - Adaptive frame sampling with mandatory and candidate frames
//! - Section detection over batched detector calls
//! - Run-length voting over batched classifier signals
//! - Oracle traits implemented by the model service client

pub mod classifier;
pub mod config;
pub mod crop;
pub mod error;
pub mod ffmpeg;
pub mod inspector;
pub mod oracle;
pub mod probe;
pub mod progress;
pub mod run_length;
pub mod sampler;
pub mod sectionalizer;
pub mod source;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use classifier::{Classifier, ConeReading, FrameScore, SectionSignals, SectionVerdict};
pub use config::{BatchSizes, InspectionProfile};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::{FfmpegOpener, FfmpegSource};
pub use inspector::VideoInspector;
pub use oracle::{
    ClassifierOracles, DetectionOracle, OracleRegistry, OracleSet, ScoreOracle, SegmentationOracle,
};
pub use probe::{probe_video, VideoInfo};
pub use progress::{JobProgress, ProgressSender};
pub use sampler::{FrameSample, FrameSampler};
pub use sectionalizer::{Section, SectionFrame, Sectionalizer};
pub use source::{FrameImage, FrameSource, SourceOpener};
