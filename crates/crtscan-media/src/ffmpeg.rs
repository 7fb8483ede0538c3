//! FFmpeg-backed frame source.
//!
//! Frames are decoded by an `ffmpeg` child process into raw RGB24 on stdout
//! and read one frame-sized chunk at a time. A `showinfo` filter logs the
//! presentation timestamp of every frame on stderr; those timestamps, not the
//! container frame rate, drive `position_ms`.

use async_trait::async_trait;
use image::RgbImage;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};
use crate::source::{FrameSource, SourceOpener};

const SHOWINFO_TAG: &str = "Parsed_showinfo";

/// Frame timestamp from a `showinfo` log line.
///
/// Returns `None` for lines that do not describe a frame, and `Some(None)`
/// for a frame without a usable timestamp.
pub(crate) fn showinfo_frame_pts(line: &str) -> Option<Option<f64>> {
    if !line.contains(SHOWINFO_TAG) {
        return None;
    }
    let (_, rest) = line.split_once("pts_time:")?;
    let pts_ms = rest
        .split_whitespace()
        .next()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|secs| secs.is_finite())
        .map(|secs| secs * 1000.0);
    Some(pts_ms)
}

/// Forward per-frame timestamps from ffmpeg's stderr until it closes.
async fn forward_pts<R>(stderr: R, tx: mpsc::UnboundedSender<Option<f64>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match showinfo_frame_pts(&line) {
                Some(pts) => {
                    if tx.send(pts).is_err() {
                        break;
                    }
                }
                None => debug!(line = %line, "ffmpeg"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read FFmpeg stderr");
                break;
            }
        }
    }
}

/// Presentation clock of a forward-only decode, relative to the first frame.
///
/// Frames without a timestamp, and the end of the stream, are placed one
/// frame duration after the previous frame. The duration is the latest
/// observed timestamp step, initially taken from the container frame rate.
#[derive(Debug, Clone)]
struct PtsClock {
    origin_ms: Option<f64>,
    last_ms: Option<f64>,
    next_ms: Option<f64>,
    frame_ms: f64,
}

impl PtsClock {
    fn new(fallback_fps: f64) -> Self {
        let fps = if fallback_fps > 0.0 { fallback_fps } else { 30.0 };
        Self {
            origin_ms: None,
            last_ms: None,
            next_ms: None,
            frame_ms: 1000.0 / fps,
        }
    }

    /// Record the timestamp of the frame the next read returns.
    fn set_next(&mut self, pts_ms: Option<f64>) {
        let relative = pts_ms.map(|pts| pts - *self.origin_ms.get_or_insert(pts));
        if let (Some(next), Some(last)) = (relative, self.last_ms) {
            if next > last {
                self.frame_ms = next - last;
            }
        }
        self.next_ms = relative.or_else(|| self.last_ms.map(|last| last + self.frame_ms));
    }

    /// The pending frame was read.
    fn advance(&mut self) {
        self.last_ms = Some(self.position_ms());
    }

    fn position_ms(&self) -> f64 {
        self.next_ms.unwrap_or(0.0)
    }
}

/// Sequential decoder over an `ffmpeg` rawvideo pipe.
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    pts_rx: mpsc::UnboundedReceiver<Option<f64>>,
    clock: PtsClock,
    info: VideoInfo,
    frames_read: u64,
    exhausted: bool,
}

impl FfmpegSource {
    /// Probe and start decoding a video file.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path).await?;

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-nostats", "-loglevel", "info", "-nostdin", "-i"])
            .arg(path)
            .args(["-vf", "showinfo", "-vsync", "passthrough"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-flush_packets", "1", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::source_failed("FFmpeg stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::source_failed("FFmpeg stderr not captured"))?;

        let (pts_tx, pts_rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_pts(stderr, pts_tx));

        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            nominal_fps = info.nominal_fps,
            "Opened FFmpeg frame source"
        );

        let mut source = Self {
            child,
            stdout,
            pts_rx,
            clock: PtsClock::new(info.average_fps),
            info,
            frames_read: 0,
            exhausted: false,
        };
        let first = source.next_pts().await;
        source.clock.set_next(first);
        Ok(source)
    }

    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    /// Timestamp of the next decoded frame, `None` past the last frame.
    async fn next_pts(&mut self) -> Option<f64> {
        self.pts_rx.recv().await.flatten()
    }

    async fn finish(&mut self) {
        self.exhausted = true;
        match self.child.wait().await {
            Ok(status) if !status.success() => {
                warn!(status = %status, frames = self.frames_read, "FFmpeg exited early");
            }
            Err(e) => warn!(error = %e, "Failed to reap FFmpeg process"),
            _ => {}
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn read_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len()];
        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finish().await;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        self.frames_read += 1;
        self.clock.advance();
        let next = self.next_pts().await;
        self.clock.set_next(next);

        RgbImage::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or_else(|| MediaError::source_failed("Decoded frame has unexpected size"))
    }

    fn position_ms(&self) -> f64 {
        self.clock.position_ms()
    }

    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn reported_fps(&self) -> f64 {
        self.info.nominal_fps
    }
}

/// Opens [`FfmpegSource`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegOpener;

#[async_trait]
impl SourceOpener for FfmpegOpener {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegSource::open(path).await?))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
