//! Sequential frame source abstraction.
//!
//! The inspection core only needs forward reads: no seeking is ever issued.

use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;

use crate::error::MediaResult;

/// Decoded frame pixels, shared between pipeline stages without copying.
pub type FrameImage = Arc<RgbImage>;

/// A forward-only stream of decoded frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next frame, `None` once the stream is exhausted.
    async fn read_frame(&mut self) -> MediaResult<Option<RgbImage>>;

    /// Presentation time in milliseconds of the next frame to be read.
    fn position_ms(&self) -> f64;

    /// Total frame count reported by the container (may be inaccurate).
    fn frame_count(&self) -> u64;

    /// Frame rate reported by the container (may be inaccurate).
    fn reported_fps(&self) -> f64;
}

/// Opens frame sources for job video paths.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}
